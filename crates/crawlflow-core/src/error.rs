//! Engine error types.

use crawlflow_browser::DriverError;

use crate::captcha::CaptchaError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("element not resolvable via {method}('{value}'): {reason}")]
    ElementNotResolvable {
        method: String,
        value: String,
        reason: String,
    },

    #[error("step {step} has no extracted content")]
    NoContentExtracted { step: String },

    #[error("captcha token not injected, none of these fields exist: {tried}")]
    CaptchaInjectionFailed { tried: String },

    #[error(transparent)]
    Captcha(#[from] CaptchaError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("step '{0}' is not defined in the step graph")]
    UnknownStep(String),

    #[error("step '{0}' targets the popup but no popup is open")]
    NoActivePopup(String),

    #[error("run exceeded its limit of {0} steps")]
    StepLimitExceeded(usize),

    #[error("invalid attachment '{name}': {reason}")]
    InvalidAttachment { name: String, reason: String },

    #[error("invalid run configuration: {0}")]
    Config(String),

    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Timeout-class failure from the driver (navigation, click, wait).
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Driver(err) if err.is_timeout())
    }
}
