//! Step handlers, one per step type.
//!
//! [`dispatch`] matches the step's payload exhaustively and runs exactly one
//! handler. A handler may ask the walker to jump somewhere other than the
//! declared successor; only the check handler does.

mod captcha;
mod check;
mod download;
mod extract;
mod interact;
mod navigation;

use crawlflow_browser::{BrowserDriver, PageHandle};
use std::time::Duration;

use crate::captcha::CaptchaSolver;
use crate::context::SessionContext;
use crate::error::Result;
use crate::step::{Step, StepAction};

pub use captcha::TOKEN_FIELDS;
pub use interact::decode_attachments;

/// What a handler works against for one step visit.
pub(crate) struct StepScope<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub solver: &'a dyn CaptchaSolver,
    /// Page or popup this step targets.
    pub page: PageHandle,
    pub step_name: &'a str,
    pub step_id: String,
    pub settle_delay: Duration,
}

/// Run the handler for `step`. Returns a rollback target that overrides the
/// declared `next_step`, if one was requested.
pub(crate) async fn dispatch(
    scope: &StepScope<'_>,
    session: &mut SessionContext,
    step: &mut Step,
) -> Result<Option<String>> {
    match &mut step.action {
        StepAction::Navigation { url, timeout_ms } => {
            navigation::navigate(scope, url, *timeout_ms).await?;
        }
        StepAction::CheckElement { elements } => {
            return Ok(check::check_elements(scope, elements).await);
        }
        StepAction::ExtractContent { contents, target } => {
            extract::extract_content(scope, session, contents, target.as_ref()).await?;
        }
        StepAction::Form { form } => {
            interact::run_items(scope, "form", form).await?;
        }
        StepAction::Click { clicks } => {
            interact::run_items(scope, "click", clicks).await?;
        }
        StepAction::WaitFor { elements } => {
            navigation::wait_for(scope, elements).await?;
        }
        StepAction::Sleep { time } => {
            navigation::sleep(scope, *time).await?;
        }
        StepAction::StoreUrl => {
            navigation::store_url(scope, session).await?;
        }
        StepAction::DownloadPage { filename } => {
            download::download_page(scope, filename).await?;
        }
        StepAction::SolverCaptcha {
            recaptchav2,
            imagecaptcha,
            image_path,
        } => {
            captcha::solve_captcha(
                scope,
                session,
                *recaptchav2,
                *imagecaptcha,
                image_path.as_deref(),
            )
            .await;
        }
    }

    Ok(None)
}
