//! Element resolution from declarative locators.

use crawlflow_browser::{BrowserDriver, ElementHandle, LocatorMethod, PageHandle};

use crate::error::{EngineError, Result};
use crate::step::Locator;

/// Resolve `locator` on `page`. Never retried here; callers own retry policy.
pub async fn resolve(
    driver: &dyn BrowserDriver,
    page: &PageHandle,
    locator: &Locator,
) -> Result<ElementHandle> {
    let method = locator
        .method
        .parse::<LocatorMethod>()
        .map_err(|e| not_resolvable(locator, e))?;

    driver
        .resolve(page, method, &locator.value, &locator.extras)
        .await
        .map_err(|e| not_resolvable(locator, e))
}

fn not_resolvable(locator: &Locator, reason: impl ToString) -> EngineError {
    EngineError::ElementNotResolvable {
        method: locator.method.clone(),
        value: locator.value.clone(),
        reason: reason.to_string(),
    }
}
