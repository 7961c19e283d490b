use std::path::Path;
use tracing::info;

use super::StepScope;
use crate::error::Result;

pub(super) async fn download_page(scope: &StepScope<'_>, filename: &Path) -> Result<()> {
    let url = scope.driver.current_url(&scope.page).await?;
    info!(step = %scope.step_id, url = %url, filename = %filename.display(), "Downloading page");

    if let Some(parent) = filename.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let html = scope.driver.content(&scope.page).await?;
    tokio::fs::write(filename, html).await?;
    Ok(())
}
