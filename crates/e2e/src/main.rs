//! Blog app E2E runner entry point
//!
//! Runs the built-in blog app scenarios (and any YAML scenarios) against an
//! already running application.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use blogapp_e2e::playwright::{Browser, PlaywrightFactory};
use blogapp_e2e::{E2eResult, RunnerConfig, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "blogapp-e2e")]
#[command(about = "E2E scenario runner for the blog app")]
#[command(version)]
struct Args {
    /// TOML config file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root URL of the running application
    #[arg(long, env = "BLOG_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Directory of YAML scenarios to run in addition to the built-ins
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// Skip the built-in blog app scenarios
    #[arg(long)]
    no_builtin: bool,

    /// Run only scenarios matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser to use
    #[arg(long, value_enum)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Wait budget per step in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Scenarios to run concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> E2eResult<(RunnerConfig, Option<String>, Option<String>)> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load(path)?,
            None => RunnerConfig::default(),
        };

        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if self.specs.is_some() {
            config.specs_dir = self.specs;
        }
        if self.no_builtin {
            config.include_builtin = false;
        }
        if let Some(browser) = self.browser {
            config.playwright.browser = browser;
        }
        if self.headed {
            config.playwright.headless = false;
        }
        if let Some(ms) = self.timeout_ms {
            config.timing.step_timeout_ms = ms;
        }
        if let Some(workers) = self.workers {
            config.workers = workers.max(1);
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }

        Ok((config, self.name, self.tag))
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let (config, name, tag) = args.into_config()?;

    let sessions = Arc::new(PlaywrightFactory::new(config.playwright.clone())?);
    let runner = TestRunner::new(config, sessions)?;

    runner.wait_for_app().await?;

    let results = if let Some(name) = name {
        runner.run_named(&name).await?
    } else if let Some(tag) = tag {
        runner.run_tagged(&tag).await?
    } else {
        runner.run_all().await?
    };

    runner.write_results(&results)?;

    Ok(results.all_passed())
}
