use tracing::{error, info, warn};

use super::StepScope;
use crate::error::{EngineError, Result};
use crate::resolver;
use crate::step::CheckItem;

/// Check every item's visibility, in order. A missing element with budget
/// left spends one attempt, optionally reloads or navigates, waits the
/// settle delay and requests its rollback target. The last requesting item
/// wins; item failures never abort the visit.
pub(super) async fn check_elements(scope: &StepScope<'_>, items: &mut [CheckItem]) -> Option<String> {
    let mut redirect = None;

    for (index, item) in items.iter_mut().enumerate() {
        let visible = match is_visible(scope, item).await {
            Ok(visible) => visible,
            Err(err) => {
                error!(step = %scope.step_id, item = index, error = %err, "Check item failed");
                false
            }
        };

        if visible {
            continue;
        }

        warn!(
            step = %scope.step_id,
            item = index,
            method = %item.element.method,
            value = %item.element.value,
            "Element not visible"
        );

        let Some(rollback) = item.rollback_target().map(str::to_string) else {
            continue;
        };

        if item.attempts == 0 {
            warn!(step = %scope.step_id, item = index, rollback = %rollback, "No attempts left, not rolling back");
            continue;
        }

        item.attempts -= 1;

        if item.reload
            && let Err(err) = scope.driver.reload(&scope.page).await
        {
            error!(step = %scope.step_id, item = index, error = %err, "Reload failed");
        }

        if let Some(url) = item.goto_url()
            && let Err(err) = scope.driver.goto(&scope.page, url, None).await
        {
            error!(step = %scope.step_id, item = index, url, error = %err, "Goto failed");
        }

        tokio::time::sleep(scope.settle_delay).await;

        info!(
            step = %scope.step_id,
            item = index,
            rollback = %rollback,
            attempts_left = item.attempts,
            "Requesting rollback"
        );
        redirect = Some(rollback);
    }

    redirect
}

async fn is_visible(scope: &StepScope<'_>, item: &CheckItem) -> Result<bool> {
    let element = resolver::resolve(scope.driver, &scope.page, &item.element).await?;
    scope
        .driver
        .is_visible(&element)
        .await
        .map_err(EngineError::from)
}
