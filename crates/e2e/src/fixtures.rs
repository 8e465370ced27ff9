//! Fixture setup over the application's REST API
//!
//! The application under test is already running; this module only probes
//! it for readiness and seeds or clears its data between scenarios.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::spec::{FixtureSpec, NewUser};

/// HTTP client for the testing endpoints of the blog app
#[derive(Debug, Clone)]
pub struct FixtureClient {
    client: reqwest::Client,
    base_url: String,
}

impl FixtureClient {
    pub fn new(base_url: &str) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Wait for the application root to answer with a success status
    pub async fn wait_until_ready(&self, timeout_duration: Duration) -> E2eResult<()> {
        let root = self.url("/");
        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match self.client.get(&root).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Application is up at {}", self.base_url);
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Readiness probe returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application at {}...", self.base_url);
                    }
                    // Connection refused is expected while the app is starting
                    if !e.is_connect() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::AppUnreachable {
            url: root,
            attempts,
        })
    }

    /// `POST /api/testing/reset`: drop every user and blog
    pub async fn reset(&self) -> E2eResult<()> {
        let resp = self
            .client
            .post(self.url("/api/testing/reset"))
            .send()
            .await
            .map_err(|e| E2eError::FixtureSetup(format!("reset request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(E2eError::FixtureSetup(format!(
                "reset returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// `POST /api/users`
    pub async fn create_user(&self, user: &NewUser) -> E2eResult<()> {
        let resp = self
            .client
            .post(self.url("/api/users"))
            .json(user)
            .send()
            .await
            .map_err(|e| {
                E2eError::FixtureSetup(format!("creating user {} failed: {}", user.username, e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(E2eError::FixtureSetup(format!(
                "creating user {} returned {}: {}",
                user.username,
                status,
                body.trim()
            )));
        }
        Ok(())
    }

    /// Bring the application to the state a scenario expects
    pub async fn prepare(&self, spec: &FixtureSpec) -> E2eResult<()> {
        if spec.reset {
            self.reset().await?;
        }
        for user in &spec.users {
            self.create_user(user).await?;
        }
        debug!("Fixtures ready: reset={}, users={}", spec.reset, spec.users.len());
        Ok(())
    }
}
