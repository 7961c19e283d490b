use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeRequest, build_bridge_script, parse_reply_line};
use crate::{
    ActionMethod, BrowserDriver, Cookie, DriverError, ElementHandle, FilePayload, LaunchOptions,
    LocatorMethod, PageHandle, Result,
};

const PROBE_TIMEOUT_SECS: u64 = 15;
const RESOLVE_PLAYWRIGHT: &str =
    "try { require.resolve('playwright'); } catch (_) { process.exit(1); }";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeProbe {
    pub node_available: bool,
    pub node_version: Option<String>,
    pub playwright_package_available: bool,
    pub chromium_cache_detected: bool,
    pub ready: bool,
    pub notes: Vec<String>,
}

impl RuntimeProbe {
    fn empty() -> Self {
        Self {
            node_available: false,
            node_version: None,
            playwright_package_available: false,
            chromium_cache_detected: false,
            ready: false,
            notes: Vec::new(),
        }
    }
}

struct BridgeProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    // Keeps the generated script alive for the lifetime of the process.
    _script_dir: tempfile::TempDir,
}

/// Chromium driver backed by a Node.js Playwright bridge process.
///
/// The bridge is spawned on [`BrowserDriver::launch`] and serves one request
/// at a time until [`BrowserDriver::shutdown`].
pub struct PlaywrightDriver {
    node_path: String,
    working_dir: Option<PathBuf>,
    bridge: Mutex<Option<BridgeProcess>>,
    next_request: AtomicU64,
}

impl Default for PlaywrightDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaywrightDriver {
    pub fn new() -> Self {
        Self {
            node_path: "node".to_string(),
            working_dir: None,
            bridge: Mutex::new(None),
            next_request: AtomicU64::new(1),
        }
    }

    pub fn with_node_path(mut self, node_path: impl Into<String>) -> Self {
        self.node_path = node_path.into();
        self
    }

    /// Directory the bridge runs in; `playwright` is resolved from there.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub async fn probe_runtime(&self) -> Result<RuntimeProbe> {
        let mut probe = RuntimeProbe::empty();

        if let Some(version) = self.node_output(&["--version"]).await {
            probe.node_available = true;
            probe.node_version = Some(version);
        }

        if probe.node_available {
            probe.playwright_package_available = self
                .node_output(&["-e", RESOLVE_PLAYWRIGHT])
                .await
                .is_some();
        }

        probe.chromium_cache_detected = playwright_cache_dirs(|key| std::env::var(key).ok())
            .iter()
            .any(|dir| dir.exists());
        probe.ready = probe.node_available && probe.playwright_package_available;

        if !probe.node_available {
            probe.notes.push(
                "Node.js not found. Install Node.js 20+ to enable the browser driver.".to_string(),
            );
        }

        if probe.node_available && !probe.playwright_package_available {
            probe
                .notes
                .push("Playwright npm package not found. Run: npm i -D playwright".to_string());
        }

        if probe.ready && !probe.chromium_cache_detected {
            probe.notes.push(
                "Chromium browser binary not found in Playwright cache. Run: npx playwright install chromium".to_string(),
            );
        }

        Ok(probe)
    }

    async fn spawn_bridge(&self) -> Result<BridgeProcess> {
        let script_dir = tempfile::Builder::new()
            .prefix("crawlflow-bridge-")
            .tempdir()?;
        let script_path = script_dir.path().join("bridge.mjs");
        tokio::fs::write(&script_path, build_bridge_script()).await?;

        let mut command = Command::new(&self.node_path);
        command
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Bridge("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "crawlflow_browser::bridge", "{}", line);
                }
            });
        }

        info!(pid = ?child.id(), "Playwright bridge started");

        Ok(BridgeProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            _script_dir: script_dir,
        })
    }

    async fn call(&self, op: &str, args: Value) -> Result<Value> {
        let mut guard = self.bridge.lock().await;
        let bridge = guard.as_mut().ok_or(DriverError::Closed)?;

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&BridgeRequest { id, op, args })?;
        line.push('\n');

        debug!(op, id, "Bridge request");
        bridge.stdin.write_all(line.as_bytes()).await?;
        bridge.stdin.flush().await?;

        loop {
            let Some(line) = bridge.stdout.next_line().await? else {
                return Err(DriverError::Closed);
            };

            match parse_reply_line(&line) {
                Some(reply) => {
                    let reply = reply?;
                    if reply.id != id && reply.id != 0 {
                        warn!(expected = id, got = reply.id, "Discarding stale bridge reply");
                        continue;
                    }
                    return reply.into_result();
                }
                None => debug!(target: "crawlflow_browser::bridge", "{}", line),
            }
        }
    }

    async fn call_page(&self, op: &str, page: &PageHandle, mut args: Map<String, Value>) -> Result<Value> {
        args.insert("page".to_string(), json!(page.id()));
        self.call(op, Value::Object(args)).await
    }

    async fn call_element(
        &self,
        op: &str,
        element: &ElementHandle,
        mut args: Map<String, Value>,
    ) -> Result<Value> {
        args.insert("element".to_string(), json!(element.id()));
        self.call(op, Value::Object(args)).await
    }
}

fn page_id(value: Value) -> Result<PageHandle> {
    match value {
        Value::String(id) => Ok(PageHandle::new(id)),
        other => Err(DriverError::Bridge(format!(
            "expected a page handle, got {}",
            other
        ))),
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn launch(&self, options: &LaunchOptions) -> Result<PageHandle> {
        {
            let mut guard = self.bridge.lock().await;
            if guard.is_none() {
                *guard = Some(self.spawn_bridge().await?);
            }
        }

        let value = self
            .call(
                "launch",
                json!({
                    "headless": options.headless,
                    "userAgent": options.user_agent,
                    "userDataDir": options.user_data_dir.display().to_string(),
                    "chromiumArgs": options.chromium_args(),
                }),
            )
            .await?;
        page_id(value)
    }

    async fn goto(&self, page: &PageHandle, url: &str, timeout_ms: Option<u64>) -> Result<()> {
        let mut args = Map::new();
        args.insert("url".to_string(), json!(url));
        args.insert("timeoutMs".to_string(), json!(timeout_ms));
        self.call_page("goto", page, args).await.map(|_| ())
    }

    async fn reload(&self, page: &PageHandle) -> Result<()> {
        self.call_page("reload", page, Map::new()).await.map(|_| ())
    }

    async fn wait_for_load(&self, page: &PageHandle) -> Result<()> {
        self.call_page("waitForLoad", page, Map::new())
            .await
            .map(|_| ())
    }

    async fn current_url(&self, page: &PageHandle) -> Result<String> {
        let value = self.call_page("url", page, Map::new()).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn content(&self, page: &PageHandle) -> Result<String> {
        let value = self.call_page("content", page, Map::new()).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, page: &PageHandle, path: &Path) -> Result<()> {
        let mut args = Map::new();
        args.insert("path".to_string(), json!(path.display().to_string()));
        self.call_page("screenshot", page, args).await.map(|_| ())
    }

    async fn close_page(&self, page: &PageHandle) -> Result<()> {
        self.call_page("closePage", page, Map::new())
            .await
            .map(|_| ())
    }

    async fn resolve(
        &self,
        page: &PageHandle,
        method: LocatorMethod,
        value: &str,
        extras: &Map<String, Value>,
    ) -> Result<ElementHandle> {
        let mut args = Map::new();
        args.insert("method".to_string(), json!(method.js_name()));
        args.insert("value".to_string(), json!(value));
        args.insert("extras".to_string(), Value::Object(extras.clone()));
        match self.call_page("resolve", page, args).await? {
            Value::String(id) => Ok(ElementHandle::new(page.clone(), id)),
            other => Err(DriverError::Bridge(format!(
                "expected an element handle, got {}",
                other
            ))),
        }
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool> {
        let value = self.call_element("isVisible", element, Map::new()).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn wait_for(&self, element: &ElementHandle) -> Result<()> {
        self.call_element("waitFor", element, Map::new())
            .await
            .map(|_| ())
    }

    async fn invoke(
        &self,
        element: &ElementHandle,
        action: ActionMethod,
        value: Option<&Value>,
        extras: &Map<String, Value>,
    ) -> Result<Value> {
        let mut args = Map::new();
        args.insert("method".to_string(), json!(action.js_name()));
        args.insert("value".to_string(), value.cloned().unwrap_or(Value::Null));
        args.insert("extras".to_string(), Value::Object(extras.clone()));
        self.call_element("invoke", element, args).await
    }

    async fn set_input_files(&self, element: &ElementHandle, files: &[FilePayload]) -> Result<()> {
        let files: Vec<Value> = files
            .iter()
            .map(|file| {
                json!({
                    "name": file.name,
                    "mimeType": file.mime_type,
                    "buffer": BASE64.encode(&file.buffer),
                })
            })
            .collect();
        let mut args = Map::new();
        args.insert("files".to_string(), Value::Array(files));
        self.call_element("setInputFiles", element, args)
            .await
            .map(|_| ())
    }

    async fn selector_exists(&self, page: &PageHandle, selector: &str) -> Result<bool> {
        let mut args = Map::new();
        args.insert("selector".to_string(), json!(selector));
        let value = self.call_page("selectorExists", page, args).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn evaluate(&self, page: &PageHandle, expression: &str, arg: Value) -> Result<Value> {
        let mut args = Map::new();
        args.insert("expression".to_string(), json!(expression));
        args.insert("arg".to_string(), arg);
        self.call_page("evaluate", page, args).await
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        let value = self.call("cookies", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.call("clearCookies", json!({})).await.map(|_| ())
    }

    async fn begin_popup_capture(&self, page: &PageHandle) -> Result<()> {
        self.call_page("beginPopup", page, Map::new())
            .await
            .map(|_| ())
    }

    async fn take_popup(&self, page: &PageHandle) -> Result<PageHandle> {
        let value = self.call_page("takePopup", page, Map::new()).await?;
        page_id(value)
    }

    async fn block_resource_types(&self, page: &PageHandle, types: &[String]) -> Result<()> {
        let mut args = Map::new();
        args.insert("types".to_string(), json!(types));
        self.call_page("blockResourceTypes", page, args)
            .await
            .map(|_| ())
    }

    async fn shutdown(&self) -> Result<()> {
        let result = self.call("shutdown", json!({})).await;

        let mut guard = self.bridge.lock().await;
        if let Some(mut bridge) = guard.take() {
            match timeout(Duration::from_secs(5), bridge.child.wait()).await {
                Ok(status) => debug!(status = ?status, "Playwright bridge exited"),
                Err(_) => {
                    warn!("Playwright bridge did not exit, killing it");
                    bridge.child.kill().await.ok();
                }
            }
        }

        match result {
            Ok(_) | Err(DriverError::Closed) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl PlaywrightDriver {
    /// Trimmed stdout of `node <args>` when it exits successfully in time.
    async fn node_output(&self, args: &[&str]) -> Option<String> {
        let mut command = Command::new(&self.node_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        match timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(Ok(output)) => {
                debug!(node = %self.node_path, ?args, status = %output.status, "Probe command failed");
                None
            }
            Ok(Err(err)) => {
                debug!(node = %self.node_path, error = %err, "Probe command did not start");
                None
            }
            Err(_) => {
                warn!(node = %self.node_path, ?args, "Probe command timed out");
                None
            }
        }
    }
}

/// Where Playwright may have installed its browsers, most specific first.
fn playwright_cache_dirs(env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = env("PLAYWRIGHT_BROWSERS_PATH")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .into_iter()
        .collect();

    if let Some(home) = env("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".cache").join("ms-playwright"));
        dirs.push(home.join("Library").join("Caches").join("ms-playwright"));
    }
    if let Some(profile) = env("USERPROFILE") {
        dirs.push(PathBuf::from(profile).join("AppData").join("Local").join("ms-playwright"));
    }
    dirs
}
