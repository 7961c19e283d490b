use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value)?;
    println!("{output}");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let output = serde_json::to_string_pretty(value)?;
    std::fs::write(path, output).with_context(|| format!("Failed to write {}", path.display()))
}
