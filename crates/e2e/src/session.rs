//! Browser session abstraction
//!
//! A [`Session`] is one isolated page scoped to a single scenario. The
//! executor only needs a handful of primitives from it; everything about
//! waiting and matching expectations happens on the Rust side.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;
use crate::locator::Locator;

/// Observed state of one resolved element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub visible: bool,
    /// Rendered text of the element and its descendants
    pub text: String,
}

impl ElementState {
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            visible: true,
            text: text.into(),
        }
    }

    pub fn hidden(text: impl Into<String>) -> Self {
        Self {
            visible: false,
            text: text.into(),
        }
    }
}

/// How native `alert`/`confirm`/`prompt` dialogs are answered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogPolicy {
    Accept,
    #[default]
    Dismiss,
}

impl DialogPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogPolicy::Accept => "accept",
            DialogPolicy::Dismiss => "dismiss",
        }
    }
}

#[async_trait]
pub trait Session: Send {
    /// Load a URL, relative to the application base URL
    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    /// Resolve a locator right now, without waiting
    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>>;

    /// Click the single element the locator resolves to
    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;

    /// Replace the value of the single input the locator resolves to
    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    /// Answer dialogs raised after this call with `policy`
    async fn set_dialog_policy(&mut self, policy: DialogPolicy) -> E2eResult<()>;

    /// Serialized page HTML, for failure diagnostics
    async fn content(&mut self) -> E2eResult<String>;

    /// Write a full-page screenshot. Returns `false` if unsupported.
    async fn screenshot(&mut self, _path: &Path) -> E2eResult<bool> {
        Ok(false)
    }

    /// Tear the page down. The session is unusable afterwards.
    async fn close(&mut self) -> E2eResult<()>;
}

/// Opens one fresh session per scenario
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, base_url: &str) -> E2eResult<Box<dyn Session>>;
}
