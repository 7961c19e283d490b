mod support;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use crawlflow_core::{Engine, EngineError, Result, RunReport};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use support::{FakeDriver, FakeSolver, config, options};
use tempfile::tempdir;

async fn run(driver: &Arc<FakeDriver>, first: &str, steps: Value) -> Result<RunReport> {
    run_with(driver, FakeSolver::new(), first, steps, |_| {}).await
}

async fn run_with(
    driver: &Arc<FakeDriver>,
    solver: FakeSolver,
    first: &str,
    steps: Value,
    edit: impl FnOnce(&mut crawlflow_core::RunConfig),
) -> Result<RunReport> {
    let dir = tempdir().unwrap();
    let mut config = config(first, steps);
    edit(&mut config);
    Engine::new(driver.clone(), Arc::new(solver), options(dir.path()))
        .run(config)
        .await
}

fn click(value: &str) -> Value {
    json!({
        "element": {"method": "locator", "value": value},
        "element_action": {"method": "click"}
    })
}

#[tokio::test]
async fn extraction_keeps_truthy_values_only() {
    let driver = Arc::new(
        FakeDriver::new()
            .value("#title", json!("Invoice 42"))
            .value("#empty", json!("")),
    );

    let report = run(
        &driver,
        "extract",
        json!({
            "extract": {
                "type": "extract_content",
                "id": "e1",
                "target": {"filename": "invoice.json"},
                "contents": [
                    {"element": {"method": "locator", "value": "#title"}, "element_action": {"method": "inner_text"}},
                    {"element": {"method": "locator", "value": "#empty"}, "element_action": {"method": "inner_text"}}
                ]
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(report.extracted.len(), 1);
    let record = &report.extracted[0];
    assert_eq!(record.step_id, "e1");
    assert_eq!(record.run_id, report.run_id);
    assert_eq!(record.output_contents, vec![json!("Invoice 42")]);
    assert_eq!(
        record.target.as_ref().unwrap().filename.as_deref(),
        Some(Path::new("invoice.json"))
    );
}

#[tokio::test]
async fn extraction_of_nothing_fails_the_run() {
    let driver = Arc::new(FakeDriver::new().value("#a", json!(null)).value("#b", json!(false)));

    let err = run(
        &driver,
        "extract",
        json!({
            "extract": {
                "type": "extract_content",
                "contents": [
                    {"element": {"method": "locator", "value": "#a"}, "element_action": {"method": "text_content"}},
                    {"element": {"method": "locator", "value": "#b"}, "element_action": {"method": "is_checked"}}
                ]
            }
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::NoContentExtracted { ref step } if step == "extract"));
    assert_eq!(driver.cookies_cleared(), 1);
}

#[tokio::test]
async fn extraction_without_contents_fails_the_run() {
    let driver = Arc::new(FakeDriver::new());

    let err = run(
        &driver,
        "extract",
        json!({"extract": {"type": "extract_content", "contents": []}}),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::NoContentExtracted { ref step } if step == "extract"));
    assert!(driver.calls_matching("invoke").is_empty());
}

#[tokio::test]
async fn optional_timeout_is_skipped() {
    let driver = Arc::new(FakeDriver::new().timeout("#cookie-banner"));
    let mut banner = click("#cookie-banner");
    banner["optional"] = json!(true);

    let report = run(
        &driver,
        "clicks",
        json!({"clicks": {"type": "click", "clicks": [banner, click("#submit")]}}),
    )
    .await
    .unwrap();

    assert_eq!(report.steps, vec!["clicks"]);
    assert!(
        driver
            .calls_matching("invoke page-1 click #submit")
            .first()
            .is_some()
    );
}

#[tokio::test]
async fn required_timeout_aborts_the_run() {
    let driver = Arc::new(FakeDriver::new().timeout("#submit"));

    let err = run(
        &driver,
        "clicks",
        json!({"clicks": {"type": "click", "clicks": [click("#submit"), click("#after")]}}),
    )
    .await
    .unwrap_err();

    assert!(err.is_timeout());
    assert!(driver.calls_matching("invoke page-1 click #after").is_empty());
}

#[tokio::test]
async fn optional_does_not_hide_resolution_errors() {
    let driver = Arc::new(FakeDriver::new().unresolvable("#field"));

    let err = run(
        &driver,
        "form",
        json!({
            "form": {
                "type": "form",
                "form": [{
                    "element": {"method": "locator", "value": "#field"},
                    "element_action": {"method": "fill", "value": "x"},
                    "optional": true
                }]
            }
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::ElementNotResolvable { ref value, .. } if value == "#field"));
}

#[tokio::test]
async fn form_fills_in_order_with_values() {
    let driver = Arc::new(FakeDriver::new());

    run(
        &driver,
        "form",
        json!({
            "form": {
                "type": "form",
                "form": [
                    {"element": {"method": "get_by_label", "value": "User"}, "element_action": {"method": "fill", "value": "ana"}},
                    {"element": {"method": "get_by_placeholder", "value": "Password"}, "element_action": {"method": "fill", "value": "secret"}}
                ]
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(
        driver.calls_matching("invoke"),
        vec![
            "invoke page-1 fill User \"ana\"",
            "invoke page-1 fill Password \"secret\"",
        ]
    );
}

#[tokio::test]
async fn attachments_are_decoded_before_upload() {
    let driver = Arc::new(FakeDriver::new());
    let raw = b"%PDF-1.7 statement";

    run(
        &driver,
        "upload",
        json!({
            "upload": {
                "type": "form",
                "form": [{
                    "element": {"method": "locator", "value": "input[type=file]"},
                    "element_action": {
                        "method": "set_input_files",
                        "is_attachment": true,
                        "extras": {"files": [{
                            "buffer": BASE64.encode(raw),
                            "name": "statement.pdf",
                            "mimeType": "application/pdf"
                        }]}
                    }
                }]
            }
        }),
    )
    .await
    .unwrap();

    let files = driver.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "statement.pdf");
    assert_eq!(files[0].buffer.len(), raw.len());
    assert!(driver.calls_matching("invoke").is_empty());
}

#[tokio::test]
async fn attachment_needs_set_input_files() {
    let driver = Arc::new(FakeDriver::new());

    let err = run(
        &driver,
        "upload",
        json!({
            "upload": {
                "type": "form",
                "form": [{
                    "element": {"method": "locator", "value": "#file"},
                    "element_action": {"method": "click"},
                    "is_attachment": true
                }]
            }
        }),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::InvalidAttachment { .. }));
}

#[tokio::test]
async fn download_page_writes_the_html() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("pages").join("home.html");
    let driver = Arc::new(FakeDriver::new());

    run(
        &driver,
        "download",
        json!({"download": {"type": "download_page", "filename": target}}),
    )
    .await
    .unwrap();

    let html = std::fs::read_to_string(&target).unwrap();
    assert!(html.contains(support::ENTRY_URL));
}

#[tokio::test]
async fn navigation_waits_for_load() {
    let driver = Arc::new(FakeDriver::new());

    let report = run(
        &driver,
        "go",
        json!({
            "go": {"type": "navigation", "url": "https://example.com/next", "timeout_ms": 1500, "next_step": "url"},
            "url": {"type": "store_url"}
        }),
    )
    .await
    .unwrap();

    let calls = driver.calls();
    let goto = calls
        .iter()
        .position(|call| call == "goto page-1 https://example.com/next Some(1500)")
        .unwrap();
    assert_eq!(calls[goto + 1], "wait_for_load page-1");
    assert_eq!(report.stored_urls[0].url, "https://example.com/next");
}

#[tokio::test]
async fn wait_for_logs_missing_elements_and_continues() {
    let driver = Arc::new(FakeDriver::new().timeout("#slow"));

    let report = run(
        &driver,
        "wait",
        json!({
            "wait": {
                "type": "wait_for",
                "next_step": "pause",
                "elements": [
                    {"element": {"method": "locator", "value": "#slow"}},
                    {"element": {"method": "locator", "value": "#fast"}}
                ]
            },
            "pause": {"type": "sleep", "time": 0.01}
        }),
    )
    .await
    .unwrap();

    assert_eq!(report.steps, vec!["wait", "pause"]);
    assert_eq!(driver.calls_matching("wait_for ").len(), 2);
}

#[tokio::test]
async fn negative_sleep_is_rejected() {
    let driver = Arc::new(FakeDriver::new());

    let err = run(&driver, "pause", json!({"pause": {"type": "sleep", "time": -1.0}}))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Config(_)));
}

#[tokio::test]
async fn recaptcha_token_goes_to_the_first_present_field() {
    let driver = Arc::new(
        FakeDriver::new()
            .selector("#g-recaptcha-response")
            .selector("#recaptcha-token"),
    );
    let solver = FakeSolver::new().with_token("TOKEN-123");

    let report = run_with(
        &driver,
        solver,
        "captcha",
        json!({"captcha": {"type": "solver_captcha", "recaptchav2": true, "next_step": "after"}, "after": {"type": "store_url"}}),
        |config| {
            config.solver_captcha = Some("api-key".to_string());
            config.recaptcha_site_key = Some("site-key".to_string());
        },
    )
    .await
    .unwrap();

    assert_eq!(report.steps, vec!["captcha", "after"]);
    assert_eq!(
        driver.calls_matching("selector_exists"),
        vec![
            "selector_exists page-1 #recaptchaToken",
            "selector_exists page-1 #g-recaptcha-response",
        ]
    );
    assert_eq!(
        driver.evaluated(),
        vec![json!({"id": "g-recaptcha-response", "token": "TOKEN-123"})]
    );
}

#[tokio::test]
async fn recaptcha_without_fields_does_not_fail_the_run() {
    let driver = Arc::new(FakeDriver::new());
    let solver = FakeSolver::new().with_token("TOKEN-123");

    let report = run_with(
        &driver,
        solver,
        "captcha",
        json!({"captcha": {"type": "solver_captcha", "recaptchav2": true}}),
        |config| {
            config.solver_captcha = Some("api-key".to_string());
            config.recaptcha_site_key = Some("site-key".to_string());
        },
    )
    .await
    .unwrap();

    assert_eq!(report.steps, vec!["captcha"]);
    assert_eq!(driver.calls_matching("selector_exists").len(), 3);
    assert!(driver.evaluated().is_empty());
}

#[tokio::test]
async fn recaptcha_without_api_key_skips_the_solver() {
    let driver = Arc::new(FakeDriver::new());
    let solver = Arc::new(FakeSolver::new().with_token("unused"));
    let dir = tempdir().unwrap();
    let mut config = config(
        "captcha",
        json!({"captcha": {"type": "solver_captcha", "recaptchav2": true}}),
    );
    config.recaptcha_site_key = Some("site-key".to_string());

    Engine::new(driver.clone(), solver.clone(), options(dir.path()))
        .run(config)
        .await
        .unwrap();

    assert_eq!(solver.recaptcha_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn image_captcha_types_and_submits_the_answer() {
    let driver = Arc::new(FakeDriver::new().visible("What code is in the image?", &[true]));
    let solver = FakeSolver::new().with_text("x7k2");

    run_with(
        &driver,
        solver,
        "captcha",
        json!({"captcha": {"type": "solver_captcha", "imagecaptcha": true, "image_path": "captcha.png"}}),
        |config| config.solver_captcha = Some("api-key".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(
        driver.calls_matching("invoke"),
        vec![
            "invoke page-1 wait_for What code is in the image? ",
            "invoke page-1 type input[id=\"ans\"] \"x7k2\"",
            "invoke page-1 click button[type=\"button\"] ",
        ]
    );
}

#[tokio::test]
async fn image_captcha_is_skipped_when_the_prompt_never_appears() {
    let driver = Arc::new(FakeDriver::new().timeout("What code is in the image?"));
    let solver = Arc::new(FakeSolver::new().with_text("x7k2"));
    let dir = tempdir().unwrap();
    let mut config = config(
        "captcha",
        json!({
            "captcha": {"type": "solver_captcha", "imagecaptcha": true, "next_step": "after"},
            "after": {"type": "store_url"}
        }),
    );
    config.solver_captcha = Some("api-key".to_string());

    let report = Engine::new(driver.clone(), solver.clone(), options(dir.path()))
        .run(config)
        .await
        .unwrap();

    assert_eq!(report.steps, vec!["captcha", "after"]);
    assert_eq!(solver.image_calls.load(Ordering::Relaxed), 0);
    assert_eq!(
        driver.calls_matching("invoke"),
        vec!["invoke page-1 wait_for What code is in the image? "]
    );
}

#[tokio::test]
async fn popup_steps_route_to_the_captured_window() {
    let driver = Arc::new(FakeDriver::new().popup_on_click("#open").value("#total", json!("R$ 10")));

    let report = run(
        &driver,
        "open",
        json!({
            "open": {"type": "click", "create_popup": true, "next_step": "read", "clicks": [click("#open")]},
            "read": {
                "type": "extract_content",
                "in_popup": true,
                "next_step": "back",
                "contents": [{"element": {"method": "locator", "value": "#total"}, "element_action": {"method": "inner_text"}}]
            },
            "back": {"type": "store_url"}
        }),
    )
    .await
    .unwrap();

    assert_eq!(report.extracted[0].output_contents, vec![json!("R$ 10")]);
    assert!(
        driver
            .calls()
            .contains(&"invoke page-2 inner_text #total ".to_string())
    );

    let closed: Vec<String> = driver.closed().iter().map(ToString::to_string).collect();
    assert_eq!(closed, vec!["page-2", "page-1"]);
}

#[tokio::test]
async fn popup_step_without_popup_fails() {
    let driver = Arc::new(FakeDriver::new());

    let err = run(
        &driver,
        "read",
        json!({"read": {"type": "store_url", "in_popup": true}}),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::NoActivePopup(ref step) if step == "read"));
}

#[tokio::test]
async fn create_popup_without_a_window_times_out() {
    let driver = Arc::new(FakeDriver::new());

    let err = run(
        &driver,
        "open",
        json!({"open": {"type": "click", "create_popup": true, "clicks": [click("#nothing")]}}),
    )
    .await
    .unwrap_err();

    assert!(err.is_timeout());
}
