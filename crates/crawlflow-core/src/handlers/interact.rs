use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use crawlflow_browser::{ActionMethod, FilePayload};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::StepScope;
use crate::error::{EngineError, Result};
use crate::resolver;
use crate::step::InteractionItem;

/// Run form or click items in order. Timeouts on `optional` items are
/// skipped; every other failure aborts the step.
pub(super) async fn run_items(scope: &StepScope<'_>, kind: &str, items: &[InteractionItem]) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        match process_item(scope, item).await {
            Ok(()) => {}
            Err(err) if item.optional && err.is_timeout() => {
                warn!(
                    step = %scope.step_id,
                    kind,
                    item = index,
                    error = %err,
                    "Element not found and skipped by optional"
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

async fn process_item(scope: &StepScope<'_>, item: &InteractionItem) -> Result<()> {
    let element = resolver::resolve(scope.driver, &scope.page, &item.element).await?;
    let action = item.element_action.method.parse::<ActionMethod>()?;

    if item.is_attachment() {
        if action != ActionMethod::SetInputFiles {
            return Err(EngineError::InvalidAttachment {
                name: item.element.value.clone(),
                reason: format!("attachments need set_input_files, not {}", action),
            });
        }

        let files = decode_attachments(&item.element_action.extras)?;
        debug!(step = %scope.step_id, files = files.len(), "Attaching files");
        scope.driver.set_input_files(&element, &files).await?;
        return Ok(());
    }

    debug!(step = %scope.step_id, action = %action, value = %item.element.value, "Element action");
    scope
        .driver
        .invoke(
            &element,
            action,
            item.element_action.value.as_ref(),
            &item.element_action.extras,
        )
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AttachmentFile {
    buffer: String,
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

/// Decode `extras.files[*].buffer` from base64 into raw bytes.
pub fn decode_attachments(extras: &Map<String, Value>) -> Result<Vec<FilePayload>> {
    let Some(files) = extras.get("files") else {
        return Ok(Vec::new());
    };

    let files: Vec<AttachmentFile> =
        serde_json::from_value(files.clone()).map_err(|e| EngineError::InvalidAttachment {
            name: "files".to_string(),
            reason: e.to_string(),
        })?;

    files
        .into_iter()
        .map(|file| {
            let buffer = BASE64
                .decode(file.buffer.trim())
                .map_err(|e| EngineError::InvalidAttachment {
                    name: file.name.clone(),
                    reason: e.to_string(),
                })?;
            Ok(FilePayload {
                name: file.name,
                mime_type: file.mime_type,
                buffer,
            })
        })
        .collect()
}
