//! CLI configuration file support
//!
//! Loads configuration from ~/.config/crawlflow/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fallback AntiCaptcha key when neither the document nor the file has one.
pub const CAPTCHA_KEY_ENV: &str = "CRAWLFLOW_ANTICAPTCHA_KEY";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// User agent for every page
    pub user_agent: Option<String>,
    /// Node.js executable running the Playwright bridge
    pub node_path: Option<String>,
    /// Directory whose node_modules provides `playwright`
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// AntiCaptcha API key
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root for per-run snapshot folders
    pub root: Option<PathBuf>,
}

impl CliConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("crawlflow").join("config.toml"))
    }

    /// Captcha key from the environment, then from the file.
    pub fn captcha_api_key(&self) -> Option<String> {
        std::env::var(CAPTCHA_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.captcha.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_all_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[browser]
user_agent = "crawler/1.0"
node_path = "/usr/local/bin/node"

[captcha]
api_key = "abc"

[output]
root = "/var/crawlflow"
"#,
        )
        .unwrap();

        let config = CliConfig::load_from_path(Some(path));
        assert_eq!(config.browser.user_agent.as_deref(), Some("crawler/1.0"));
        assert_eq!(config.browser.node_path.as_deref(), Some("/usr/local/bin/node"));
        assert!(config.browser.working_dir.is_none());
        assert_eq!(config.captcha.api_key.as_deref(), Some("abc"));
        assert_eq!(config.output.root, Some(PathBuf::from("/var/crawlflow")));
    }

    #[test]
    fn invalid_or_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[browser\nbroken").unwrap();

        assert!(CliConfig::load_from_path(Some(path)).browser.user_agent.is_none());
        assert!(
            CliConfig::load_from_path(Some(dir.path().join("absent.toml")))
                .captcha
                .api_key
                .is_none()
        );
    }
}
