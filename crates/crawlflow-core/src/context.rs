//! Run-scoped session state shared by every step.

use chrono::Local;
use crawlflow_browser::{Cookie, PageHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::error::{EngineError, Result};
use crate::step::{ExtractTarget, StepGraph};

/// Timestamp-derived run id, used for snapshot names and profile isolation.
pub fn new_run_id() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Cookies by name; a later cookie with the same name replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar(BTreeMap<String, Cookie>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cookie: Cookie) -> Option<Cookie> {
        self.0.insert(cookie.name.clone(), cookie)
    }

    pub fn merge(&mut self, cookies: impl IntoIterator<Item = Cookie>) {
        for cookie in cookies {
            self.insert(cookie);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.0.values()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    pub enabled: bool,
    pub output_dir: Option<PathBuf>,
}

impl LogSettings {
    /// Directory for snapshots, only when logging is enabled.
    pub fn snapshot_dir(&self) -> Option<&PathBuf> {
        if self.enabled {
            self.output_dir.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaptchaSettings {
    pub api_key: Option<String>,
    pub site_key: Option<String>,
    /// Site the captcha token is requested for (the run's entry URL).
    pub site_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub step_id: String,
    pub run_id: String,
    pub target: Option<ExtractTarget>,
    pub output_contents: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUrl {
    pub step_id: String,
    pub run_id: String,
    pub url: String,
}

/// Exclusively owned by one run: page and popup handles, cookies, logging
/// and captcha settings, and the step graph (whose check items carry the
/// remaining retry budgets).
#[derive(Debug)]
pub struct SessionContext {
    pub run_id: String,
    pub page: PageHandle,
    pub popup: Option<PageHandle>,
    pub cookies: CookieJar,
    pub logging: LogSettings,
    pub captcha: CaptchaSettings,
    pub graph: StepGraph,
    pub first_step: String,
    pub extracted: Vec<ExtractionRecord>,
    pub stored_urls: Vec<StoredUrl>,
    pub trace: Vec<String>,
}

impl SessionContext {
    pub fn new(
        run_id: String,
        page: PageHandle,
        config: &RunConfig,
        output_dir: Option<PathBuf>,
        fallback_api_key: Option<String>,
    ) -> Self {
        Self {
            run_id,
            page,
            popup: None,
            cookies: CookieJar::new(),
            logging: LogSettings {
                enabled: config.log,
                output_dir,
            },
            captcha: CaptchaSettings {
                api_key: config
                    .solver_captcha
                    .clone()
                    .filter(|key| !key.is_empty())
                    .or(fallback_api_key),
                site_key: config.recaptcha_site_key.clone(),
                site_url: config.url.clone(),
            },
            graph: config.steps.clone(),
            first_step: config.first_step.clone(),
            extracted: Vec::new(),
            stored_urls: Vec::new(),
            trace: Vec::new(),
        }
    }

    /// Page a step acts on: the popup for `in_popup` steps, the page otherwise.
    pub fn target_page(&self, step_name: &str, in_popup: bool) -> Result<PageHandle> {
        if !in_popup {
            return Ok(self.page.clone());
        }

        self.popup
            .clone()
            .ok_or_else(|| EngineError::NoActivePopup(step_name.to_string()))
    }

    /// Make `popup` the active popup, returning the one it replaces.
    pub fn promote_popup(&mut self, popup: PageHandle) -> Option<PageHandle> {
        self.popup.replace(popup)
    }

    pub fn into_report(self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            steps: self.trace,
            cookies: self.cookies,
            extracted: self.extracted,
            stored_urls: self.stored_urls,
            output_dir: self.logging.output_dir,
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    /// Executed step names, in order.
    pub steps: Vec<String>,
    pub cookies: CookieJar,
    pub extracted: Vec<ExtractionRecord>,
    pub stored_urls: Vec<StoredUrl>,
    pub output_dir: Option<PathBuf>,
}
