use crawlflow_browser::ActionMethod;
use serde_json::{Map, json};
use std::path::Path;
use tracing::{info, warn};

use super::StepScope;
use crate::captcha::{CaptchaError, RecaptchaTask};
use crate::context::{CaptchaSettings, SessionContext};
use crate::error::{EngineError, Result};
use crate::resolver;
use crate::step::Locator;

/// Form fields that receive a reCAPTCHA token, tried in this order.
pub const TOKEN_FIELDS: [&str; 3] = ["recaptchaToken", "g-recaptcha-response", "recaptcha-token"];

const SET_FIELD_VALUE: &str =
    "(args) => { document.getElementById(args.id).value = args.token; }";
const IMAGE_CAPTCHA_PROMPT: &str = "What code is in the image?";
const IMAGE_CAPTCHA_ANSWER: &str = "input[id=\"ans\"]";
const IMAGE_CAPTCHA_SUBMIT: &str = "button[type=\"button\"]";
const DEFAULT_IMAGE_PATH: &str = "image.png";
/// How long the image captcha prompt may take to appear.
const PROMPT_TIMEOUT_MS: u64 = 5_000;

/// Never fails the run: solver and injection problems are logged.
pub(super) async fn solve_captcha(
    scope: &StepScope<'_>,
    session: &SessionContext,
    recaptcha: bool,
    image: bool,
    image_path: Option<&Path>,
) {
    if recaptcha {
        match solve_recaptcha(scope, &session.captcha).await {
            Ok(field) => info!(step = %scope.step_id, field, "Captcha token injected"),
            Err(err) => warn!(step = %scope.step_id, error = %err, "Captcha not solved"),
        }
    }

    if image {
        let image_path = image_path.unwrap_or(Path::new(DEFAULT_IMAGE_PATH));
        if let Err(err) = solve_image_captcha(scope, &session.captcha, image_path).await {
            warn!(step = %scope.step_id, error = %err, "Image captcha not solved");
        }
    }
}

async fn solve_recaptcha(scope: &StepScope<'_>, captcha: &CaptchaSettings) -> Result<&'static str> {
    let api_key = captcha.api_key.as_deref().ok_or(CaptchaError::MissingApiKey)?;
    let site_key = captcha
        .site_key
        .as_deref()
        .ok_or(CaptchaError::MissingSiteKey)?;

    let token = scope
        .solver
        .solve_recaptcha(&RecaptchaTask {
            site_url: &captcha.site_url,
            site_key,
            api_key,
        })
        .await?;

    inject_token(scope, &token).await
}

/// Write `token` into the first known token field present on the page.
async fn inject_token(scope: &StepScope<'_>, token: &str) -> Result<&'static str> {
    for field in TOKEN_FIELDS {
        if scope
            .driver
            .selector_exists(&scope.page, &format!("#{}", field))
            .await?
        {
            scope
                .driver
                .evaluate(
                    &scope.page,
                    SET_FIELD_VALUE,
                    json!({ "id": field, "token": token }),
                )
                .await?;
            return Ok(field);
        }
    }

    Err(EngineError::CaptchaInjectionFailed {
        tried: TOKEN_FIELDS
            .iter()
            .map(|field| format!("#{}", field))
            .collect::<Vec<_>>()
            .join(", "),
    })
}

async fn solve_image_captcha(
    scope: &StepScope<'_>,
    captcha: &CaptchaSettings,
    image_path: &Path,
) -> Result<()> {
    let prompt = resolver::resolve(
        scope.driver,
        &scope.page,
        &Locator::new("get_by_text", IMAGE_CAPTCHA_PROMPT),
    )
    .await?;
    let mut wait = Map::new();
    wait.insert("state".to_string(), json!("visible"));
    wait.insert("timeout".to_string(), json!(PROMPT_TIMEOUT_MS));
    match scope
        .driver
        .invoke(&prompt, ActionMethod::WaitFor, None, &wait)
        .await
    {
        Ok(_) => {}
        Err(err) if err.is_timeout() => {
            warn!(step = %scope.step_id, timeout_ms = PROMPT_TIMEOUT_MS, "Image captcha prompt not found");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }
    if !scope.driver.is_visible(&prompt).await? {
        warn!(step = %scope.step_id, "Image captcha prompt not visible");
        return Ok(());
    }

    let api_key = captcha.api_key.as_deref().ok_or(CaptchaError::MissingApiKey)?;
    let token = scope.solver.solve_image(api_key, image_path).await?;

    let answer = resolver::resolve(
        scope.driver,
        &scope.page,
        &Locator::new("locator", IMAGE_CAPTCHA_ANSWER),
    )
    .await?;
    scope
        .driver
        .invoke(&answer, ActionMethod::Type, Some(&json!(token)), &Map::new())
        .await?;

    let submit = resolver::resolve(
        scope.driver,
        &scope.page,
        &Locator::new("locator", IMAGE_CAPTCHA_SUBMIT),
    )
    .await?;
    scope
        .driver
        .invoke(&submit, ActionMethod::Click, None, &Map::new())
        .await?;

    info!(step = %scope.step_id, "Image captcha answered");
    Ok(())
}
