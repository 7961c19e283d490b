pub mod probe;
pub mod run;
pub mod validate;

use crawlflow_browser::PlaywrightDriver;

use crate::config::CliConfig;

/// Playwright driver with the node executable and working directory from config.
pub fn playwright_driver(config: &CliConfig) -> PlaywrightDriver {
    let mut driver = PlaywrightDriver::new();
    if let Some(node_path) = &config.browser.node_path {
        driver = driver.with_node_path(node_path.clone());
    }
    if let Some(dir) = &config.browser.working_dir {
        driver = driver.with_working_dir(dir.clone());
    }
    driver
}
