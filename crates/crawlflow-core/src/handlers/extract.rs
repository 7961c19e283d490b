use crawlflow_browser::ActionMethod;
use serde_json::Value;
use tracing::info;

use super::StepScope;
use crate::context::{ExtractionRecord, SessionContext};
use crate::error::{EngineError, Result};
use crate::resolver;
use crate::step::{ContentItem, ExtractTarget};

pub(super) async fn extract_content(
    scope: &StepScope<'_>,
    session: &mut SessionContext,
    contents: &[ContentItem],
    target: Option<&ExtractTarget>,
) -> Result<()> {
    let mut output_contents = Vec::new();

    for item in contents {
        let element = resolver::resolve(scope.driver, &scope.page, &item.element).await?;
        let action = item.element_action.method.parse::<ActionMethod>()?;
        let value = scope
            .driver
            .invoke(
                &element,
                action,
                item.element_action.value.as_ref(),
                &item.element_action.extras,
            )
            .await?;

        if is_truthy(&value) {
            output_contents.push(value);
        }
    }

    if output_contents.is_empty() {
        return Err(EngineError::NoContentExtracted {
            step: scope.step_name.to_string(),
        });
    }

    let contents = Value::Array(output_contents.clone());
    info!(
        step = %scope.step_id,
        run_id = %session.run_id,
        count = output_contents.len(),
        contents = %contents,
        "Extracted content"
    );

    session.extracted.push(ExtractionRecord {
        step_id: scope.step_id.clone(),
        run_id: session.run_id.clone(),
        target: target.cloned(),
        output_contents,
    });
    Ok(())
}

/// Empty strings, zero, `false`, `null` and empty collections are not content.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falsy_values_are_not_content() {
        for value in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&value), "{value} should be falsy");
        }
        for value in [json!(true), json!(3), json!("<p>hi</p>"), json!(["a"])] {
            assert!(is_truthy(&value), "{value} should be truthy");
        }
    }
}
