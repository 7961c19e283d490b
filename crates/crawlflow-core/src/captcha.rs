//! Captcha-solving collaborator.
//!
//! [`AntiCaptchaClient`] talks to the anti-captcha.com task API: a task is
//! created, then polled until the service reports it ready or fails.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anti-captcha.com";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_MAX_WAIT_SECS: u64 = 180;
const RECAPTCHA_MIN_SCORE: f64 = 0.9;
const RECAPTCHA_PAGE_ACTION: &str = "home_page";

#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("captcha service error {code}: {description}")]
    Service { code: String, description: String },

    #[error("captcha request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("captcha task {task_id} not solved within {waited:?}")]
    TimedOut { task_id: u64, waited: Duration },

    #[error("no captcha api key configured")]
    MissingApiKey,

    #[error("captcha site key is not configured")]
    MissingSiteKey,

    #[error("captcha image unreadable: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct RecaptchaTask<'a> {
    pub site_url: &'a str,
    pub site_key: &'a str,
    pub api_key: &'a str,
}

#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Token for a reCAPTCHA challenge on `task.site_url`.
    async fn solve_recaptcha(&self, task: &RecaptchaTask<'_>) -> Result<String, CaptchaError>;

    /// Decoded text of an image challenge.
    async fn solve_image(&self, api_key: &str, image_path: &Path) -> Result<String, CaptchaError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    error_id: i64,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    task_id: Option<u64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    solution: Option<Value>,
}

impl ApiResponse {
    fn check(self) -> Result<Self, CaptchaError> {
        if self.error_id == 0 {
            return Ok(self);
        }

        Err(CaptchaError::Service {
            code: self
                .error_code
                .unwrap_or_else(|| format!("errorId {}", self.error_id)),
            description: self.error_description.unwrap_or_default(),
        })
    }

    /// Solution field once the task is ready, `None` while still processing.
    fn solution_field(&self, field: &str) -> Result<Option<String>, CaptchaError> {
        if self.status.as_deref() != Some("ready") {
            return Ok(None);
        }

        self.solution
            .as_ref()
            .and_then(|solution| solution.get(field))
            .and_then(Value::as_str)
            .map(|value| Some(value.to_string()))
            .ok_or_else(|| CaptchaError::Service {
                code: "ERROR_NO_SOLUTION".to_string(),
                description: format!("ready task has no '{}' in its solution", field),
            })
    }
}

pub struct AntiCaptchaClient {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl Default for AntiCaptchaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiCaptchaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    async fn post(&self, method: &str, body: Value) -> Result<ApiResponse, CaptchaError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), method);
        let response: ApiResponse = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.check()
    }

    async fn run_task(&self, api_key: &str, task: Value, field: &str) -> Result<String, CaptchaError> {
        let created = self
            .post(
                "createTask",
                json!({ "clientKey": api_key, "task": task, "softId": 0 }),
            )
            .await?;
        let task_id = created.task_id.ok_or_else(|| CaptchaError::Service {
            code: "ERROR_NO_TASK_ID".to_string(),
            description: "createTask returned no taskId".to_string(),
        })?;

        debug!(task_id, "Captcha task created");
        let started = Instant::now();
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let result = self
                .post(
                    "getTaskResult",
                    json!({ "clientKey": api_key, "taskId": task_id }),
                )
                .await?;
            if let Some(value) = result.solution_field(field)? {
                debug!(task_id, "Captcha task solved");
                return Ok(value);
            }

            if started.elapsed() >= self.max_wait {
                return Err(CaptchaError::TimedOut {
                    task_id,
                    waited: started.elapsed(),
                });
            }
        }
    }
}

#[async_trait]
impl CaptchaSolver for AntiCaptchaClient {
    async fn solve_recaptcha(&self, task: &RecaptchaTask<'_>) -> Result<String, CaptchaError> {
        self.run_task(
            task.api_key,
            json!({
                "type": "RecaptchaV3TaskProxyless",
                "websiteURL": task.site_url,
                "websiteKey": task.site_key,
                "minScore": RECAPTCHA_MIN_SCORE,
                "pageAction": RECAPTCHA_PAGE_ACTION,
            }),
            "gRecaptchaResponse",
        )
        .await
    }

    async fn solve_image(&self, api_key: &str, image_path: &Path) -> Result<String, CaptchaError> {
        let image = tokio::fs::read(image_path).await?;
        self.run_task(
            api_key,
            json!({ "type": "ImageToTextTask", "body": BASE64.encode(image) }),
            "text",
        )
        .await
    }
}
