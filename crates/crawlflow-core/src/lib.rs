//! Step execution engine for declarative browser runs.
//!
//! A run document names a graph of steps (navigation, visibility checks,
//! form filling, clicks, extraction, downloads, captcha solving). The
//! [`Engine`] walks that graph from its first step against one browser
//! session:
//! - Each step is dispatched to exactly one handler by its type
//! - `check_element` steps can redirect the walk to a rollback step while
//!   their per-item attempt budget lasts
//! - `create_popup` steps capture the window their actions open, and
//!   `in_popup` steps act on it
//! - Cookies accumulate across steps; every step can be snapshotted
//! - Page, popup and cookies are released on every exit path

pub mod captcha;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod step;

mod handlers;

pub use captcha::{AntiCaptchaClient, CaptchaError, CaptchaSolver, RecaptchaTask};
pub use config::RunConfig;
pub use context::{
    CaptchaSettings, CookieJar, ExtractionRecord, LogSettings, RunReport, SessionContext,
    StoredUrl, new_run_id,
};
pub use engine::{Engine, EngineOptions};
pub use error::{EngineError, Result};
pub use handlers::{TOKEN_FIELDS, decode_attachments};
pub use step::{
    CheckItem, ContentItem, ElementAction, ExtractTarget, InteractionItem, Locator, Step,
    StepAction, StepGraph, StepId, WaitItem,
};
