use anyhow::Result;
use std::path::PathBuf;

const CRAWLFLOW_DIR: &str = ".crawlflow";
const LOGS_DIR: &str = "logs";

/// Environment variable to override the Crawlflow directory.
const CRAWLFLOW_DIR_ENV: &str = "CRAWLFLOW_DIR";

/// Resolve the Crawlflow data directory.
/// Priority: CRAWLFLOW_DIR env var > ~/.crawlflow/
pub fn resolve_crawlflow_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CRAWLFLOW_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(CRAWLFLOW_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Get the logs directory: ~/.crawlflow/logs/
pub fn logs_dir() -> Result<PathBuf> {
    let dir = resolve_crawlflow_dir()?.join(LOGS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
