//! Step execution with bounded polling
//!
//! Every element step re-queries the session until its condition holds or
//! the step's wait budget runs out. There is no retry after a definitive
//! result: the last observation at the deadline is what gets reported.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult, FailureKind};
use crate::locator::Locator;
use crate::session::{DialogPolicy, ElementState, Session};
use crate::spec::Step;

/// Wait budget for locator resolution and assertions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub step_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            step_timeout_ms: 5000,
            poll_interval_ms: 100,
        }
    }
}

/// Result of executing one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

/// Collapse whitespace runs and trim, the way rendered text is compared
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn visible_count(elements: &[ElementState]) -> usize {
    elements.iter().filter(|e| e.visible).count()
}

/// Runs steps against a borrowed session
pub struct StepExecutor<'a> {
    session: &'a mut dyn Session,
    timing: Timing,
}

impl<'a> StepExecutor<'a> {
    pub fn new(session: &'a mut dyn Session, timing: Timing) -> Self {
        Self { session, timing }
    }

    /// Execute a step and record its outcome.
    ///
    /// The error is handed back alongside the result so the caller can
    /// classify the failure.
    pub async fn execute_step(&mut self, step: &Step) -> (StepResult, Option<E2eError>) {
        let start = Instant::now();
        let step_name = step.name();

        debug!("Executing step: {}", step_name);

        let outcome = self.run(step).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => (
                StepResult {
                    success: true,
                    step_name,
                    duration_ms,
                    error: None,
                    kind: None,
                },
                None,
            ),
            Err(e) => (
                StepResult {
                    success: false,
                    step_name,
                    duration_ms,
                    error: Some(e.to_string()),
                    kind: Some(e.kind()),
                },
                Some(e),
            ),
        }
    }

    async fn run(&mut self, step: &Step) -> E2eResult<()> {
        let timeout_ms = step.timeout_ms().unwrap_or(self.timing.step_timeout_ms);

        match step {
            Step::Navigate { url } => self.session.goto(url).await,
            Step::Fill { locator, value, .. } => {
                self.resolve_one(locator, timeout_ms).await?;
                self.session.fill(locator, value).await
            }
            Step::Click { locator, .. } => {
                self.resolve_one(locator, timeout_ms).await?;
                self.session.click(locator).await
            }
            Step::AssertVisible { locator, .. } => self.assert_visible(locator, timeout_ms).await,
            Step::AssertNotVisible { locator, .. } => {
                self.assert_not_visible(locator, timeout_ms).await
            }
            Step::AssertText { locator, text, .. } => {
                self.assert_text(locator, text, timeout_ms).await
            }
            Step::AssertCount { locator, count, .. } => {
                self.assert_count(locator, *count, timeout_ms).await
            }
            Step::HandleDialog { accept } => {
                let policy = if *accept {
                    DialogPolicy::Accept
                } else {
                    DialogPolicy::Dismiss
                };
                self.session.set_dialog_policy(policy).await
            }
            Step::Log { message } => {
                info!("[SCENARIO LOG] {}", message);
                Ok(())
            }
        }
    }

    /// Poll `locator` until `check` accepts the observed elements.
    ///
    /// Returns the last observation as `Err` when the deadline passes.
    async fn wait_for<F>(
        &mut self,
        locator: &Locator,
        timeout_ms: u64,
        mut check: F,
    ) -> E2eResult<Result<(), Vec<ElementState>>>
    where
        F: FnMut(&[ElementState]) -> bool,
    {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let interval = Duration::from_millis(self.timing.poll_interval_ms.max(1));

        loop {
            let elements = self.session.query(locator).await?;
            if check(&elements) {
                return Ok(Ok(()));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Err(elements));
            }
            sleep(interval.min(deadline - now)).await;
        }
    }

    async fn resolve_one(&mut self, locator: &Locator, timeout_ms: u64) -> E2eResult<()> {
        match self
            .wait_for(locator, timeout_ms, |els| visible_count(els) == 1)
            .await?
        {
            Ok(()) => Ok(()),
            Err(last) => Err(E2eError::LocatorNotFound {
                locator: locator.to_string(),
                matched: visible_count(&last),
                timeout_ms,
            }),
        }
    }

    async fn assert_visible(&mut self, locator: &Locator, timeout_ms: u64) -> E2eResult<()> {
        match self
            .wait_for(locator, timeout_ms, |els| visible_count(els) > 0)
            .await?
        {
            Ok(()) => Ok(()),
            Err(last) if last.is_empty() => Err(E2eError::LocatorNotFound {
                locator: locator.to_string(),
                matched: 0,
                timeout_ms,
            }),
            Err(last) => Err(E2eError::AssertionFailed {
                locator: locator.to_string(),
                expected: "visible".into(),
                observed: format!("{} match(es), none visible", last.len()),
            }),
        }
    }

    async fn assert_not_visible(&mut self, locator: &Locator, timeout_ms: u64) -> E2eResult<()> {
        match self
            .wait_for(locator, timeout_ms, |els| visible_count(els) == 0)
            .await?
        {
            Ok(()) => Ok(()),
            Err(last) => Err(E2eError::AssertionFailed {
                locator: locator.to_string(),
                expected: "not visible".into(),
                observed: format!("{} visible match(es)", visible_count(&last)),
            }),
        }
    }

    async fn assert_text(
        &mut self,
        locator: &Locator,
        expected: &str,
        timeout_ms: u64,
    ) -> E2eResult<()> {
        let want = normalize_text(expected);
        match self
            .wait_for(locator, timeout_ms, |els| {
                els.len() == 1 && normalize_text(&els[0].text) == want
            })
            .await?
        {
            Ok(()) => Ok(()),
            Err(last) => match last.as_slice() {
                [] => Err(E2eError::LocatorNotFound {
                    locator: locator.to_string(),
                    matched: 0,
                    timeout_ms,
                }),
                [only] => Err(E2eError::AssertionFailed {
                    locator: locator.to_string(),
                    expected: format!("text {:?}", want),
                    observed: format!("text {:?}", normalize_text(&only.text)),
                }),
                many => Err(E2eError::AssertionFailed {
                    locator: locator.to_string(),
                    expected: format!("one element with text {:?}", want),
                    observed: format!("{} matches", many.len()),
                }),
            },
        }
    }

    async fn assert_count(
        &mut self,
        locator: &Locator,
        count: usize,
        timeout_ms: u64,
    ) -> E2eResult<()> {
        match self
            .wait_for(locator, timeout_ms, |els| els.len() == count)
            .await?
        {
            Ok(()) => Ok(()),
            Err(last) => Err(E2eError::AssertionFailed {
                locator: locator.to_string(),
                expected: format!("count {}", count),
                observed: format!("count {}", last.len()),
            }),
        }
    }
}
