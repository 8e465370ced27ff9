//! Error types for E2E testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Application not reachable at {url} after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Scenario spec parse error: {0}")]
    SpecParse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Fixture setup failed: {0}")]
    FixtureSetup(String),

    #[error("Locator {locator} resolved to {matched} visible element(s) after {timeout_ms} ms (expected exactly one)")]
    LocatorNotFound {
        locator: String,
        matched: usize,
        timeout_ms: u64,
    },

    #[error("Assertion failed on {locator}: expected {expected}, observed {observed}")]
    AssertionFailed {
        locator: String,
        expected: String,
        observed: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Classify this error for scenario reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            E2eError::LocatorNotFound { .. } => FailureKind::LocatorNotFound,
            E2eError::AssertionFailed { .. } => FailureKind::AssertionMismatch,
            E2eError::FixtureSetup(_) | E2eError::Http(_) => FailureKind::FixtureSetup,
            _ => FailureKind::Driver,
        }
    }
}

/// Why a scenario failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    LocatorNotFound,
    AssertionMismatch,
    FixtureSetup,
    Driver,
}

pub type E2eResult<T> = Result<T, E2eError>;
