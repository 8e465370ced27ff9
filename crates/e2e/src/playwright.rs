//! Playwright browser automation
//!
//! Each session runs a small Node.js driver script that owns one browser,
//! one context and one page. Commands go to its stdin as JSON lines and
//! replies come back on stdout, so a scenario keeps a single live page
//! across all of its steps.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::session::{DialogPolicy, ElementState, Session, SessionFactory};

const DRIVER_JS: &str = r#"
const readline = require('readline');
const { chromium, firefox, webkit } = require(
  require.resolve('playwright', { paths: [process.cwd()] })
);

const engines = { chromium, firefox, webkit };
const emit = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

function build(page, chain) {
  let loc = null;
  for (const q of chain) {
    const base = loc || page;
    if (q.css !== undefined) loc = base.locator(q.css);
    else if (q.role !== undefined) {
      const opts = q.role.name != null ? { name: q.role.name, exact: !!q.role.exact } : {};
      loc = base.getByRole(q.role.role, opts);
    }
    else if (q.test_id !== undefined) loc = base.getByTestId(q.test_id);
    else if (q.text !== undefined) loc = base.getByText(q.text);
    else if (q.text_exact !== undefined) loc = base.getByText(q.text_exact, { exact: true });
    else if (q.has_text !== undefined && loc) loc = loc.filter({ hasText: q.has_text });
    else if (q.nth !== undefined && loc) loc = loc.nth(q.nth);
    else throw new Error('invalid locator query: ' + JSON.stringify(q));
  }
  if (!loc) throw new Error('empty locator');
  return loc;
}

async function snapshot(loc) {
  const n = await loc.count();
  const out = [];
  for (let i = 0; i < n; i++) {
    const el = loc.nth(i);
    try {
      const visible = await el.isVisible();
      const text = await el.evaluate((e) => e.innerText ?? e.textContent ?? '', null, { timeout: 1000 });
      out.push({ visible, text });
    } catch (_) {
      // detached between count() and nth(); skip
    }
  }
  return out;
}

async function visibleOne(loc) {
  const n = await loc.count();
  for (let i = 0; i < n; i++) {
    if (await loc.nth(i).isVisible()) return loc.nth(i);
  }
  throw new Error('no visible element');
}

(async () => {
  const engine = engines[process.env.E2E_BROWSER] || chromium;
  const browser = await engine.launch({ headless: process.env.E2E_HEADLESS !== '0' });
  const context = await browser.newContext({
    baseURL: process.env.E2E_BASE_URL,
    viewport: {
      width: parseInt(process.env.E2E_VIEWPORT_WIDTH || '1280', 10),
      height: parseInt(process.env.E2E_VIEWPORT_HEIGHT || '720', 10),
    },
  });
  const page = await context.newPage();
  const actionTimeout = parseInt(process.env.E2E_ACTION_TIMEOUT_MS || '5000', 10);
  let dialogPolicy = 'dismiss';

  page.on('dialog', async (dialog) => {
    const accepted = dialogPolicy === 'accept';
    emit({ event: 'dialog', kind: dialog.type(), message: dialog.message(), accepted });
    if (accepted) await dialog.accept();
    else await dialog.dismiss();
  });

  const ops = {
    goto: async (c) => { await page.goto(c.url); return null; },
    query: async (c) => snapshot(build(page, c.locator)),
    click: async (c) => { await (await visibleOne(build(page, c.locator))).click({ timeout: actionTimeout }); return null; },
    fill: async (c) => { await (await visibleOne(build(page, c.locator))).fill(c.value, { timeout: actionTimeout }); return null; },
    dialog: async (c) => { dialogPolicy = c.policy; return null; },
    content: async () => page.content(),
    screenshot: async (c) => { await page.screenshot({ path: c.path, fullPage: true }); return null; },
    close: async () => { await browser.close(); return null; },
  };

  emit({ event: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let cmd;
    try {
      cmd = JSON.parse(line);
      const op = ops[cmd.op];
      if (!op) throw new Error('unknown op: ' + cmd.op);
      const result = await op(cmd);
      emit({ id: cmd.id, ok: true, result });
      if (cmd.op === 'close') process.exit(0);
    } catch (error) {
      emit({ id: cmd && cmd.id, ok: false, error: error.message });
    }
  }
  await browser.close();
})().catch((error) => {
  emit({ event: 'fatal', error: error.message });
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Directory whose `node_modules` provides `playwright`
    pub node_project_dir: PathBuf,
    /// Upper bound for a single driver command
    pub command_timeout_ms: u64,
    /// Upper bound for launching the browser
    pub launch_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_project_dir: PathBuf::from("."),
            command_timeout_ms: 15_000,
            launch_timeout_ms: 30_000,
        }
    }
}

impl PlaywrightConfig {
    /// Playwright's own click/fill timeout, kept below the command timeout
    /// so the driver reports the failure before the command is abandoned.
    /// Never zero, which Playwright reads as "no timeout".
    pub fn action_timeout_ms(&self) -> u64 {
        (self.command_timeout_ms * 4 / 5).max(1)
    }
}

#[derive(Debug, Deserialize)]
struct DriverMessage {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    accepted: Option<bool>,
}

/// Launches one Playwright driver per session
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
}

impl PlaywrightFactory {
    /// Create a factory, verifying Node and Playwright are available
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.node_project_dir)?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(dir: &Path) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["--no-install", "playwright", "--version"])
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

#[async_trait]
impl SessionFactory for PlaywrightFactory {
    async fn open(&self, base_url: &str) -> E2eResult<Box<dyn Session>> {
        let session = PlaywrightSession::launch(&self.config, base_url).await?;
        Ok(Box::new(session))
    }
}

/// A live page owned by a Node driver process
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    command_timeout: Duration,
    closed: bool,
    // Keeps the driver script on disk for the life of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    /// Spawn the driver and wait for the browser to come up
    pub async fn launch(config: &PlaywrightConfig, base_url: &str) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_JS)?;

        debug!("Launching Playwright driver: {}", script_path.display());

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&config.node_project_dir)
            .env("E2E_BASE_URL", base_url)
            .env("E2E_BROWSER", config.browser.as_str())
            .env("E2E_HEADLESS", if config.headless { "1" } else { "0" })
            .env("E2E_VIEWPORT_WIDTH", config.viewport_width.to_string())
            .env("E2E_VIEWPORT_HEIGHT", config.viewport_height.to_string())
            .env("E2E_ACTION_TIMEOUT_MS", config.action_timeout_ms().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Driver(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Driver("driver stdout unavailable".into()))?;

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            closed: false,
            _script_dir: script_dir,
        };

        let launch = Duration::from_millis(config.launch_timeout_ms);
        match timeout(launch, session.wait_ready()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(E2eError::Driver(format!(
                    "browser did not start within {} ms",
                    config.launch_timeout_ms
                )))
            }
        }

        info!("Playwright {} session ready", config.browser.as_str());
        Ok(session)
    }

    async fn read_message(&mut self) -> E2eResult<DriverMessage> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Driver("driver exited".into()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DriverMessage>(&line) {
                Ok(msg) => return Ok(msg),
                // Stray console output from page scripts
                Err(_) => debug!("driver: {}", line),
            }
        }
    }

    fn log_event(msg: &DriverMessage) {
        match msg.event.as_deref() {
            Some("dialog") => info!(
                "Dialog message: {} ({})",
                msg.message.as_deref().unwrap_or(""),
                if msg.accepted.unwrap_or(false) { "accepted" } else { "dismissed" }
            ),
            Some(other) => debug!("driver event: {}", other),
            None => {}
        }
    }

    async fn wait_ready(&mut self) -> E2eResult<()> {
        loop {
            let msg = self.read_message().await?;
            match msg.event.as_deref() {
                Some("ready") => return Ok(()),
                Some("fatal") => {
                    return Err(E2eError::Driver(msg.error.unwrap_or_else(|| "launch failed".into())))
                }
                _ => Self::log_event(&msg),
            }
        }
    }

    async fn roundtrip(&mut self, id: u64, mut command: Value) -> E2eResult<Value> {
        command["id"] = json!(id);
        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let msg = self.read_message().await?;
            if msg.event.as_deref() == Some("fatal") {
                return Err(E2eError::Driver(msg.error.unwrap_or_else(|| "driver crashed".into())));
            }
            if msg.event.is_some() {
                Self::log_event(&msg);
                continue;
            }
            if msg.id != Some(id) {
                warn!("Ignoring driver reply for request {:?}", msg.id);
                continue;
            }
            return if msg.ok {
                Ok(msg.result)
            } else {
                Err(E2eError::Driver(msg.error.unwrap_or_else(|| "unknown driver error".into())))
            };
        }
    }

    /// Send a command and wait for its reply, bounded by the command timeout
    async fn call(&mut self, command: Value) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::Driver("session is closed".into()));
        }
        let id = self.next_id;
        self.next_id += 1;
        let op = command["op"].as_str().unwrap_or("?").to_string();

        match timeout(self.command_timeout, self.roundtrip(id, command)).await {
            Ok(result) => result,
            Err(_) => Err(E2eError::Driver(format!(
                "driver command '{}' timed out after {} ms",
                op,
                self.command_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl Session for PlaywrightSession {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.call(json!({ "op": "goto", "url": url })).await?;
        Ok(())
    }

    async fn query(&mut self, locator: &Locator) -> E2eResult<Vec<ElementState>> {
        let result = self.call(json!({ "op": "query", "locator": locator })).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.call(json!({ "op": "click", "locator": locator })).await?;
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call(json!({ "op": "fill", "locator": locator, "value": value }))
            .await?;
        Ok(())
    }

    async fn set_dialog_policy(&mut self, policy: DialogPolicy) -> E2eResult<()> {
        self.call(json!({ "op": "dialog", "policy": policy.as_str() }))
            .await?;
        Ok(())
    }

    async fn content(&mut self) -> E2eResult<String> {
        let result = self.call(json!({ "op": "content" })).await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<bool> {
        self.call(json!({ "op": "screenshot", "path": path.to_string_lossy() }))
            .await?;
        Ok(true)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.call(json!({ "op": "close" })).await;
        self.closed = true;
        if let Err(e) = &result {
            warn!("Driver did not close cleanly: {}", e);
            let _ = self.child.kill().await;
        }
        let _ = self.child.wait().await;
        result.map(|_| ())
    }
}
