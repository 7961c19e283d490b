#![allow(dead_code)]

use async_trait::async_trait;
use crawlflow_browser::{
    ActionMethod, BrowserDriver, Cookie, DriverError, ElementHandle, FilePayload, LaunchOptions,
    LocatorMethod, PageHandle, Result,
};
use crawlflow_core::{CaptchaError, CaptchaSolver, EngineOptions, RecaptchaTask, RunConfig};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    next_page: usize,
    visible: HashMap<String, VecDeque<bool>>,
    values: HashMap<String, Value>,
    timeouts: HashSet<String>,
    failing: HashSet<String>,
    selectors: HashSet<String>,
    cookies_on_goto: HashMap<String, Vec<Cookie>>,
    cookies_on_click: HashMap<String, Vec<Cookie>>,
    cookies: Vec<Cookie>,
    popup_on_click: HashSet<String>,
    capturing: HashSet<PageHandle>,
    pending_popup: Option<PageHandle>,
    urls: HashMap<PageHandle, String>,
    files: Vec<FilePayload>,
    evaluated: Vec<Value>,
    closed: Vec<PageHandle>,
    cookies_cleared: usize,
    shutdowns: usize,
}

/// In-memory browser. Elements are keyed by their locator value.
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visibility answers for an element, one per check; the last repeats.
    pub fn visible(self, value: &str, answers: &[bool]) -> Self {
        self.state
            .lock()
            .unwrap()
            .visible
            .insert(value.to_string(), answers.iter().copied().collect());
        self
    }

    pub fn value(self, value: &str, result: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(value.to_string(), result);
        self
    }

    /// Every action on this element times out.
    pub fn timeout(self, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .timeouts
            .insert(value.to_string());
        self
    }

    /// Resolving this element fails.
    pub fn unresolvable(self, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(value.to_string());
        self
    }

    pub fn selector(self, selector: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .selectors
            .insert(selector.to_string());
        self
    }

    pub fn cookies_on_goto(self, url: &str, cookies: Vec<Cookie>) -> Self {
        self.state
            .lock()
            .unwrap()
            .cookies_on_goto
            .insert(url.to_string(), cookies);
        self
    }

    pub fn cookies_on_click(self, value: &str, cookies: Vec<Cookie>) -> Self {
        self.state
            .lock()
            .unwrap()
            .cookies_on_click
            .insert(value.to_string(), cookies);
        self
    }

    /// Clicking this element opens a popup window.
    pub fn popup_on_click(self, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .popup_on_click
            .insert(value.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn files(&self) -> Vec<FilePayload> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn evaluated(&self) -> Vec<Value> {
        self.state.lock().unwrap().evaluated.clone()
    }

    pub fn closed(&self) -> Vec<PageHandle> {
        self.state.lock().unwrap().closed.clone()
    }

    pub fn cookies_cleared(&self) -> usize {
        self.state.lock().unwrap().cookies_cleared
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn new_page(state: &mut FakeState) -> PageHandle {
        state.next_page += 1;
        PageHandle::new(format!("page-{}", state.next_page))
    }
}

fn add_cookies(jar: &mut Vec<Cookie>, cookies: &[Cookie]) {
    for cookie in cookies {
        jar.retain(|existing| existing.name != cookie.name);
        jar.push(cookie.clone());
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch(&self, options: &LaunchOptions) -> Result<PageHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "launch headless={} dir={}",
            options.headless,
            options.user_data_dir.display()
        ));
        Ok(Self::new_page(&mut state))
    }

    async fn goto(&self, page: &PageHandle, url: &str, timeout_ms: Option<u64>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("goto {} {} {:?}", page, url, timeout_ms));
        state.urls.insert(page.clone(), url.to_string());
        if let Some(cookies) = state.cookies_on_goto.get(url).cloned() {
            add_cookies(&mut state.cookies, &cookies);
        }
        Ok(())
    }

    async fn reload(&self, page: &PageHandle) -> Result<()> {
        self.record(format!("reload {}", page));
        Ok(())
    }

    async fn wait_for_load(&self, page: &PageHandle) -> Result<()> {
        self.record(format!("wait_for_load {}", page));
        Ok(())
    }

    async fn current_url(&self, page: &PageHandle) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state.urls.get(page).cloned().unwrap_or_default())
    }

    async fn content(&self, page: &PageHandle) -> Result<String> {
        let state = self.state.lock().unwrap();
        let url = state.urls.get(page).cloned().unwrap_or_default();
        Ok(format!("<html><body>{} {}</body></html>", page, url))
    }

    async fn screenshot(&self, page: &PageHandle, path: &Path) -> Result<()> {
        self.record(format!("screenshot {} {}", page, path.display()));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"png")?;
        Ok(())
    }

    async fn close_page(&self, page: &PageHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("close {}", page));
        state.closed.push(page.clone());
        Ok(())
    }

    async fn resolve(
        &self,
        page: &PageHandle,
        method: LocatorMethod,
        value: &str,
        _extras: &Map<String, Value>,
    ) -> Result<ElementHandle> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("resolve {} {} {}", page, method, value));
        if state.failing.contains(value) {
            return Err(DriverError::Bridge(format!("cannot resolve {}", value)));
        }
        Ok(ElementHandle::new(page.clone(), value))
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("is_visible {} {}", element.page(), element.id()));
        let Some(answers) = state.visible.get_mut(element.id()) else {
            return Ok(false);
        };
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().copied()
        };
        Ok(answer.unwrap_or(false))
    }

    async fn wait_for(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("wait_for {} {}", element.page(), element.id()));
        if state.timeouts.contains(element.id()) {
            return Err(DriverError::Timeout(format!("waiting for {}", element.id())));
        }
        Ok(())
    }

    async fn invoke(
        &self,
        element: &ElementHandle,
        action: ActionMethod,
        value: Option<&Value>,
        _extras: &Map<String, Value>,
    ) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "invoke {} {} {} {}",
            element.page(),
            action,
            element.id(),
            value.map(ToString::to_string).unwrap_or_default()
        ));

        if state.timeouts.contains(element.id()) {
            return Err(DriverError::Timeout(format!("{} on {}", action, element.id())));
        }

        if action == ActionMethod::Click {
            if let Some(cookies) = state.cookies_on_click.get(element.id()).cloned() {
                add_cookies(&mut state.cookies, &cookies);
            }
            if state.popup_on_click.contains(element.id())
                && state.capturing.contains(element.page())
            {
                let popup = Self::new_page(&mut state);
                state.pending_popup = Some(popup);
            }
        }

        Ok(state
            .values
            .get(element.id())
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn set_input_files(&self, element: &ElementHandle, files: &[FilePayload]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("set_input_files {} {}", element.page(), element.id()));
        state.files.extend(files.iter().cloned());
        Ok(())
    }

    async fn selector_exists(&self, page: &PageHandle, selector: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("selector_exists {} {}", page, selector));
        Ok(state.selectors.contains(selector))
    }

    async fn evaluate(&self, page: &PageHandle, _expression: &str, arg: Value) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("evaluate {}", page));
        state.evaluated.push(arg);
        Ok(Value::Null)
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.state.lock().unwrap().cookies.clone())
    }

    async fn clear_cookies(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.cookies.clear();
        state.cookies_cleared += 1;
        Ok(())
    }

    async fn begin_popup_capture(&self, page: &PageHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("begin_popup {}", page));
        state.capturing.insert(page.clone());
        Ok(())
    }

    async fn take_popup(&self, page: &PageHandle) -> Result<PageHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("take_popup {}", page));
        state.capturing.remove(page);
        state
            .pending_popup
            .take()
            .ok_or_else(|| DriverError::Timeout("waiting for event \"popup\"".to_string()))
    }

    async fn block_resource_types(&self, page: &PageHandle, types: &[String]) -> Result<()> {
        self.record(format!("block {} {}", page, types.join(",")));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("shutdown".to_string());
        state.shutdowns += 1;
        Ok(())
    }
}

/// Captcha solver answering from fixed results.
pub struct FakeSolver {
    token: Option<String>,
    text: Option<String>,
    pub recaptcha_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl FakeSolver {
    pub fn new() -> Self {
        Self {
            token: None,
            text: None,
            recaptcha_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}

#[async_trait]
impl CaptchaSolver for FakeSolver {
    async fn solve_recaptcha(
        &self,
        _task: &RecaptchaTask<'_>,
    ) -> std::result::Result<String, CaptchaError> {
        self.recaptcha_calls.fetch_add(1, Ordering::Relaxed);
        self.token.clone().ok_or_else(|| CaptchaError::Service {
            code: "ERROR_CAPTCHA_UNSOLVABLE".to_string(),
            description: "fake solver has no token".to_string(),
        })
    }

    async fn solve_image(
        &self,
        _api_key: &str,
        _image_path: &Path,
    ) -> std::result::Result<String, CaptchaError> {
        self.image_calls.fetch_add(1, Ordering::Relaxed);
        self.text.clone().ok_or_else(|| CaptchaError::Service {
            code: "ERROR_ZERO_BALANCE".to_string(),
            description: "fake solver has no text".to_string(),
        })
    }
}

pub const ENTRY_URL: &str = "https://example.com/";

/// Engine options for tests: no settle delay, everything under `root`.
pub fn options(root: &Path) -> EngineOptions {
    EngineOptions {
        settle_delay: Duration::ZERO,
        output_root: root.join("out"),
        profile_root: root.join("profiles"),
        ..EngineOptions::default()
    }
}

pub fn config(first_step: &str, steps: Value) -> RunConfig {
    serde_json::from_value(serde_json::json!({
        "url": ENTRY_URL,
        "first_step": first_step,
        "steps": steps,
    }))
    .unwrap()
}

pub fn cookie(name: &str, value: &str) -> Cookie {
    Cookie::new(name, value)
}
