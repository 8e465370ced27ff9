//! Blog App E2E Scenario Runner
//!
//! This crate provides a Rust-controlled E2E testing framework that:
//! - Seeds the running blog app through its testing REST endpoints
//! - Controls Playwright through a long-lived Node driver (JSON lines)
//! - Runs declarative scenarios, built in or loaded from YAML
//! - Captures page HTML and a screenshot when a scenario fails
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  E2E Scenario Runner (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── wait_for_app() -> readiness probe on GET /           │
//! │    ├── FixtureClient::prepare() -> reset + seed users       │
//! │    ├── SessionFactory::open() -> Session (one per scenario) │
//! │    └── StepExecutor::execute_step(step) -> StepResult       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario                                                   │
//! │    ├── name, description, tags, fixtures                    │
//! │    ├── setup / steps / teardown: [Step]                     │
//! │    │     ├── navigate { url }                               │
//! │    │     ├── click { locator }                              │
//! │    │     ├── fill { locator, value }                        │
//! │    │     ├── assert_visible / assert_not_visible { locator }│
//! │    │     ├── assert_text { locator, text }                  │
//! │    │     ├── assert_count { locator, count }                │
//! │    │     └── handle_dialog { accept }                       │
//! │    └── Locator: css | role | test_id | text >> has_text/nth │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod executor;
pub mod fixtures;
pub mod helpers;
pub mod locator;
pub mod playwright;
pub mod runner;
pub mod scenarios;
pub mod session;
pub mod spec;

pub use error::{E2eError, E2eResult, FailureKind};
pub use executor::{normalize_text, StepExecutor, StepResult, Timing};
pub use fixtures::FixtureClient;
pub use locator::{Locator, Query};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightFactory};
pub use runner::{RunnerConfig, ScenarioResult, TestRunner, TestSuiteResult};
pub use session::{DialogPolicy, ElementState, Session, SessionFactory};
pub use spec::{FixtureSpec, NewUser, Scenario, Step};
