//! Declarative scenario specification
//!
//! Scenarios come from two places: the built-in blog app suite in
//! [`crate::scenarios`], and YAML files loaded from a specs directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// A complete scenario, executed on one fresh session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Data seeded through the API before the session opens
    #[serde(default)]
    pub fixtures: FixtureSpec,

    /// Steps run before `steps` (navigation, login)
    #[serde(default)]
    pub setup: Vec<Step>,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// Steps run after `steps`, even when they failed
    #[serde(default)]
    pub teardown: Vec<Step>,
}

/// Per-scenario fixture data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSpec {
    /// Clear all users and blogs first
    #[serde(default = "default_reset")]
    pub reset: bool,

    /// Accounts created after the reset
    #[serde(default)]
    pub users: Vec<NewUser>,
}

fn default_reset() -> bool {
    true
}

impl Default for FixtureSpec {
    fn default() -> Self {
        Self {
            reset: true,
            users: Vec::new(),
        }
    }
}

/// Body of `POST /api/users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub password: String,
}

impl NewUser {
    pub fn new(username: &str, name: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        }
    }
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to base)
    Navigate { url: String },

    /// Fill an input field
    Fill {
        locator: Locator,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Click a control
    Click {
        locator: Locator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Wait until at least one match is visible
    AssertVisible {
        locator: Locator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Wait until no match is visible
    AssertNotVisible {
        locator: Locator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Wait until the single match has this (normalized) text
    AssertText {
        locator: Locator,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Wait until the locator matches exactly `count` elements
    AssertCount {
        locator: Locator,
        count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Register how native dialogs are answered from now on
    HandleDialog {
        #[serde(default = "default_accept")]
        accept: bool,
    },

    /// Log a message (for debugging)
    Log { message: String },
}

fn default_accept() -> bool {
    true
}

impl Step {
    pub fn navigate(url: impl Into<String>) -> Self {
        Step::Navigate { url: url.into() }
    }

    pub fn click(locator: Locator) -> Self {
        Step::Click { locator, timeout_ms: None }
    }

    pub fn fill(locator: Locator, value: impl Into<String>) -> Self {
        Step::Fill {
            locator,
            value: value.into(),
            timeout_ms: None,
        }
    }

    pub fn assert_visible(locator: Locator) -> Self {
        Step::AssertVisible { locator, timeout_ms: None }
    }

    pub fn assert_not_visible(locator: Locator) -> Self {
        Step::AssertNotVisible { locator, timeout_ms: None }
    }

    pub fn assert_text(locator: Locator, text: impl Into<String>) -> Self {
        Step::AssertText {
            locator,
            text: text.into(),
            timeout_ms: None,
        }
    }

    pub fn assert_count(locator: Locator, count: usize) -> Self {
        Step::AssertCount {
            locator,
            count,
            timeout_ms: None,
        }
    }

    pub fn accept_dialogs() -> Self {
        Step::HandleDialog { accept: true }
    }

    /// Short label used in logs and results
    pub fn name(&self) -> String {
        match self {
            Step::Navigate { url } => format!("navigate:{}", url),
            Step::Fill { locator, .. } => format!("fill:{}", locator),
            Step::Click { locator, .. } => format!("click:{}", locator),
            Step::AssertVisible { locator, .. } => format!("assert_visible:{}", locator),
            Step::AssertNotVisible { locator, .. } => format!("assert_not_visible:{}", locator),
            Step::AssertText { locator, .. } => format!("assert_text:{}", locator),
            Step::AssertCount { locator, count, .. } => {
                format!("assert_count:{}={}", locator, count)
            }
            Step::HandleDialog { accept } => {
                format!("handle_dialog:{}", if *accept { "accept" } else { "dismiss" })
            }
            Step::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Step::Fill { locator, .. }
            | Step::Click { locator, .. }
            | Step::AssertVisible { locator, .. }
            | Step::AssertNotVisible { locator, .. }
            | Step::AssertText { locator, .. }
            | Step::AssertCount { locator, .. } => Some(locator),
            Step::Navigate { .. } | Step::HandleDialog { .. } | Step::Log { .. } => None,
        }
    }

    /// Per-step override of the wait budget
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            Step::Fill { timeout_ms, .. }
            | Step::Click { timeout_ms, .. }
            | Step::AssertVisible { timeout_ms, .. }
            | Step::AssertNotVisible { timeout_ms, .. }
            | Step::AssertText { timeout_ms, .. }
            | Step::AssertCount { timeout_ms, .. } => *timeout_ms,
            Step::Navigate { .. } | Step::HandleDialog { .. } | Step::Log { .. } => None,
        }
    }
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            fixtures: FixtureSpec::default(),
            setup: Vec::new(),
            steps: Vec::new(),
            teardown: Vec::new(),
        }
    }

    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml).map_err(E2eError::from)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::from_file(p)).collect()
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Every step in execution order, excluding teardown
    pub fn main_steps(&self) -> impl Iterator<Item = &Step> {
        self.setup.iter().chain(self.steps.iter())
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".into()));
        }
        for step in self.main_steps().chain(self.teardown.iter()) {
            if let Some(locator) = step.locator() {
                locator.validate().map_err(|e| {
                    E2eError::SpecParse(format!("{} in step {}: {}", self.name, step.name(), e))
                })?;
            }
        }
        Ok(())
    }
}
