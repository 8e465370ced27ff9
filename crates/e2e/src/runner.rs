//! Main scenario runner: fixtures, one session per scenario, result reporting

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult, FailureKind};
use crate::executor::{StepExecutor, StepResult, Timing};
use crate::fixtures::FixtureClient;
use crate::playwright::PlaywrightConfig;
use crate::session::{Session, SessionFactory};
use crate::spec::Scenario;

/// Page state captured when a scenario fails
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Serialized page HTML at the time of failure
    pub page_content: Option<String>,
    pub content_path: Option<PathBuf>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl ScenarioResult {
    fn failed(name: &str, duration_ms: u64, err: &E2eError) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms,
            steps: vec![],
            error: Some(err.to_string()),
            kind: Some(err.kind()),
            diagnostics: None,
        }
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl TestSuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Root URL of the running blog app
    pub base_url: String,
    /// Directory of YAML scenarios (optional)
    pub specs_dir: Option<PathBuf>,
    /// Run the built-in blog app suite
    pub include_builtin: bool,
    /// Output directory for results and diagnostics
    pub output_dir: PathBuf,
    /// Scenarios run concurrently; each still gets its own reset
    pub workers: usize,
    /// How long to wait for the app to answer before the first scenario
    pub startup_timeout_ms: u64,
    pub timing: Timing,
    pub playwright: PlaywrightConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            specs_dir: None,
            include_builtin: true,
            output_dir: PathBuf::from("test-results"),
            workers: 1,
            startup_timeout_ms: 30_000,
            timing: Timing::default(),
            playwright: PlaywrightConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            E2eError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        if config.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".into()));
        }
        Ok(config)
    }

    /// All scenarios this config selects, built-in suite first
    pub fn scenarios(&self) -> E2eResult<Vec<Scenario>> {
        let mut scenarios = Vec::new();
        if self.include_builtin {
            scenarios.extend(crate::scenarios::blog_app());
        }
        if let Some(dir) = &self.specs_dir {
            scenarios.extend(Scenario::load_all(dir)?);
        }
        Ok(scenarios)
    }
}

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex"));

/// File-name-safe version of a scenario name
fn slug(name: &str) -> String {
    UNSAFE_CHARS
        .replace_all(name.trim(), "-")
        .trim_matches('-')
        .to_lowercase()
}

/// Diagnostic file stem, unique per position in the run
fn failure_stem(index: usize, name: &str) -> String {
    format!("{:03}-{}", index, slug(name))
}

/// Main E2E scenario runner
pub struct TestRunner {
    config: RunnerConfig,
    sessions: Arc<dyn SessionFactory>,
    fixtures: FixtureClient,
}

impl TestRunner {
    pub fn new(config: RunnerConfig, sessions: Arc<dyn SessionFactory>) -> E2eResult<Self> {
        let fixtures = FixtureClient::new(&config.base_url)?;
        Ok(Self {
            config,
            sessions,
            fixtures,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Block until the application answers, or fail the run
    pub async fn wait_for_app(&self) -> E2eResult<()> {
        self.fixtures
            .wait_until_ready(Duration::from_millis(self.config.startup_timeout_ms))
            .await
    }

    /// Run every scenario the config selects
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let scenarios = self.config.scenarios()?;
        Ok(self.run_scenarios(&scenarios).await)
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let scenarios = self.config.scenarios()?;
        let filtered: Vec<Scenario> = Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect();
        Ok(self.run_scenarios(&filtered).await)
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<TestSuiteResult> {
        let scenario = self
            .config
            .scenarios()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Scenario not found: {}", name)))?;
        Ok(self.run_scenarios(std::slice::from_ref(&scenario)).await)
    }

    /// Run a list of scenarios. Failures are recorded, never propagated.
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> TestSuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let workers = self.config.workers.max(1);

        info!("Running {} scenario(s) on {} worker(s)...", scenarios.len(), workers);
        if workers > 1 {
            warn!(
                "{} workers share one backend; concurrent resets can clear another scenario's data",
                workers
            );
        }

        let results: Vec<ScenarioResult> = stream::iter(scenarios.iter().enumerate())
            .map(|(index, scenario)| self.run_at(index, scenario))
            .buffered(workers)
            .collect()
            .await;

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let skipped = 0;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        TestSuiteResult {
            started_at,
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    /// Run one scenario on a fresh session
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        self.run_at(0, scenario).await
    }

    async fn run_at(&self, index: usize, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        // Fixture failures end the scenario before any UI interaction
        if let Err(e) = self.fixtures.prepare(&scenario.fixtures).await {
            error!("✗ {} - {}", scenario.name, e);
            return ScenarioResult::failed(&scenario.name, start.elapsed().as_millis() as u64, &e);
        }

        let mut session = match self.sessions.open(self.fixtures.base_url()).await {
            Ok(session) => session,
            Err(e) => {
                error!("✗ {} - {}", scenario.name, e);
                return ScenarioResult::failed(
                    &scenario.name,
                    start.elapsed().as_millis() as u64,
                    &e,
                );
            }
        };

        let mut step_results = Vec::new();
        let mut failure: Option<E2eError> = None;
        {
            let mut executor = StepExecutor::new(session.as_mut(), self.config.timing.clone());

            for step in scenario.main_steps() {
                let (result, err) = executor.execute_step(step).await;
                step_results.push(result);
                if let Some(e) = err {
                    failure = Some(e); // Stop on first failure
                    break;
                }
            }
        }

        let stem = failure_stem(index, &scenario.name);
        let mut diagnostics = match &failure {
            Some(_) => Some(self.capture_diagnostics(session.as_mut(), &stem).await),
            None => None,
        };

        if !scenario.teardown.is_empty() {
            let mut executor = StepExecutor::new(session.as_mut(), self.config.timing.clone());
            for step in &scenario.teardown {
                let (result, err) = executor.execute_step(step).await;
                step_results.push(result);
                if let Some(e) = err {
                    warn!("Teardown of {} failed: {}", scenario.name, e);
                    failure.get_or_insert(e);
                    break;
                }
            }
        }

        if failure.is_some() && diagnostics.is_none() {
            diagnostics = Some(self.capture_diagnostics(session.as_mut(), &stem).await);
        }

        if let Err(e) = session.close().await {
            warn!("Closing session for {} failed: {}", scenario.name, e);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let result = ScenarioResult {
            name: scenario.name.clone(),
            success: failure.is_none(),
            duration_ms,
            steps: step_results,
            error: failure.as_ref().map(|e| e.to_string()),
            kind: failure.as_ref().map(|e| e.kind()),
            diagnostics,
        };

        if result.success {
            info!("✓ {} ({} ms)", result.name, result.duration_ms);
        } else {
            error!(
                "✗ {} - {}",
                result.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }

    /// Save page HTML and a screenshot next to the results
    async fn capture_diagnostics(&self, session: &mut dyn Session, stem: &str) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        let dir = self.config.output_dir.join("failures");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Cannot create {}: {}", dir.display(), e);
        }

        match session.content().await {
            Ok(html) => {
                let path = dir.join(format!("{}.html", stem));
                match std::fs::write(&path, &html) {
                    Ok(()) => diagnostics.content_path = Some(path),
                    Err(e) => warn!("Cannot write {}: {}", path.display(), e),
                }
                diagnostics.page_content = Some(html);
            }
            Err(e) => warn!("Could not capture page content for {}: {}", stem, e),
        }

        let shot = dir.join(format!("{}.png", stem));
        match session.screenshot(&shot).await {
            Ok(true) => diagnostics.screenshot_path = Some(shot),
            Ok(false) => {}
            Err(e) => warn!("Could not capture screenshot for {}: {}", stem, e),
        }

        diagnostics
    }

    /// Write scenario results to a JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
