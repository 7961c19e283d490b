use std::time::Duration;
use tracing::{debug, error, info};

use super::StepScope;
use crate::context::{SessionContext, StoredUrl};
use crate::error::{EngineError, Result};
use crate::resolver;
use crate::step::WaitItem;

pub(super) async fn navigate(scope: &StepScope<'_>, url: &str, timeout_ms: Option<u64>) -> Result<()> {
    info!(step = %scope.step_id, url, "Navigating");
    scope.driver.goto(&scope.page, url, timeout_ms).await?;
    scope.driver.wait_for_load(&scope.page).await?;
    Ok(())
}

/// Wait for each element in turn, then for the page load. Element failures
/// are logged and skipped.
pub(super) async fn wait_for(scope: &StepScope<'_>, items: &[WaitItem]) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        let waited = async {
            let element = resolver::resolve(scope.driver, &scope.page, &item.element).await?;
            scope.driver.wait_for(&element).await?;
            Ok::<(), EngineError>(())
        }
        .await;

        if let Err(err) = waited {
            error!(step = %scope.step_id, item = index, error = %err, "Wait for element failed");
        }
    }

    scope.driver.wait_for_load(&scope.page).await?;
    Ok(())
}

pub(super) async fn sleep(scope: &StepScope<'_>, seconds: f64) -> Result<()> {
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|_| EngineError::Config(format!("invalid sleep time {}", seconds)))?;

    debug!(step = %scope.step_id, seconds, "Sleeping");
    tokio::time::sleep(duration).await;
    Ok(())
}

pub(super) async fn store_url(scope: &StepScope<'_>, session: &mut SessionContext) -> Result<()> {
    let url = scope.driver.current_url(&scope.page).await?;
    info!(step = %scope.step_id, run_id = %session.run_id, url = %url, "Stored page url");

    session.stored_urls.push(StoredUrl {
        step_id: scope.step_id.clone(),
        run_id: session.run_id.clone(),
        url,
    });
    Ok(())
}
