//! Browser driver for crawlflow.
//!
//! This crate is the boundary between the step engine and a real browser. It
//! provides:
//! - The [`BrowserDriver`] trait, a handle-based capability set (navigate,
//!   resolve locators, act on elements, capture snapshots, manage cookies and
//!   popups)
//! - Statically bound capability tables ([`LocatorMethod`], [`ActionMethod`])
//!   for the method names used in run documents
//! - [`PlaywrightDriver`], which drives Chromium through a long-lived Node.js
//!   Playwright bridge process

pub mod error;
pub mod methods;

mod bridge;
mod playwright;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

pub use error::DriverError;
pub use methods::{ActionMethod, LocatorMethod};
pub use playwright::{PlaywrightDriver, RuntimeProbe};

pub type Result<T> = std::result::Result<T, DriverError>;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Opaque reference to a page (or popup) owned by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageHandle(String);

impl PageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a resolved element, bound to the page it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    page: PageHandle,
    id: String,
}

impl ElementHandle {
    pub fn new(page: PageHandle, id: impl Into<String>) -> Self {
        Self {
            page,
            id: id.into(),
        }
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchOptions {
    pub headless: bool,
    pub user_agent: String,
    /// Isolated persistent profile directory for this run.
    pub user_data_dir: PathBuf,
    #[serde(default)]
    pub extension_paths: Vec<PathBuf>,
}

impl LaunchOptions {
    pub fn new(user_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            user_data_dir: user_data_dir.into(),
            extension_paths: Vec::new(),
        }
    }

    /// Chromium command line switches needed to load the configured extensions.
    pub fn chromium_args(&self) -> Vec<String> {
        if self.extension_paths.is_empty() {
            return Vec::new();
        }

        let joined = self
            .extension_paths
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(",");

        vec![
            format!("--disable-extensions-except={}", joined),
            format!("--load-extension={}", joined),
        ]
    }
}

/// Browser cookie, in the shape Playwright reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }
}

/// File handed to a file input, already decoded to raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub name: String,
    pub mime_type: String,
    pub buffer: Vec<u8>,
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Launch an isolated browser profile and return its first page.
    async fn launch(&self, options: &LaunchOptions) -> Result<PageHandle>;

    /// Navigate. `Some(0)` disables the navigation timeout, `None` keeps the driver default.
    async fn goto(&self, page: &PageHandle, url: &str, timeout_ms: Option<u64>) -> Result<()>;

    async fn reload(&self, page: &PageHandle) -> Result<()>;

    async fn wait_for_load(&self, page: &PageHandle) -> Result<()>;

    async fn current_url(&self, page: &PageHandle) -> Result<String>;

    /// Full page HTML.
    async fn content(&self, page: &PageHandle) -> Result<String>;

    /// Full page screenshot written to `path`.
    async fn screenshot(&self, page: &PageHandle, path: &Path) -> Result<()>;

    async fn close_page(&self, page: &PageHandle) -> Result<()>;

    async fn resolve(
        &self,
        page: &PageHandle,
        method: LocatorMethod,
        value: &str,
        extras: &Map<String, Value>,
    ) -> Result<ElementHandle>;

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool>;

    async fn wait_for(&self, element: &ElementHandle) -> Result<()>;

    async fn invoke(
        &self,
        element: &ElementHandle,
        action: ActionMethod,
        value: Option<&Value>,
        extras: &Map<String, Value>,
    ) -> Result<Value>;

    async fn set_input_files(&self, element: &ElementHandle, files: &[FilePayload]) -> Result<()>;

    /// Whether a CSS selector currently matches anything on the page.
    async fn selector_exists(&self, page: &PageHandle, selector: &str) -> Result<bool>;

    /// Evaluate a page function, passing `arg` as its single argument.
    async fn evaluate(&self, page: &PageHandle, expression: &str, arg: Value) -> Result<Value>;

    async fn cookies(&self) -> Result<Vec<Cookie>>;

    async fn clear_cookies(&self) -> Result<()>;

    /// Start listening for a popup opened by `page`.
    async fn begin_popup_capture(&self, page: &PageHandle) -> Result<()>;

    /// Wait for the popup announced since [`BrowserDriver::begin_popup_capture`].
    async fn take_popup(&self, page: &PageHandle) -> Result<PageHandle>;

    /// Abort every request of the given resource types (e.g. `image`).
    async fn block_resource_types(&self, page: &PageHandle, types: &[String]) -> Result<()>;

    async fn shutdown(&self) -> Result<()>;
}
