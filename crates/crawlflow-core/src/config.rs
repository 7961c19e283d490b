//! Run configuration document.

use crawlflow_browser::{ActionMethod, LocatorMethod};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::step::{StepAction, StepGraph};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Entry URL, opened before the first step runs.
    pub url: String,
    pub first_step: String,
    pub steps: StepGraph,
    /// Snapshot every step (screenshot + HTML) into the output directory.
    #[serde(default)]
    pub log: bool,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub recaptcha_site_key: Option<String>,
    #[serde(default)]
    pub recaptcha_anchor_url: Option<String>,
    /// Captcha service API key.
    #[serde(default)]
    pub solver_captcha: Option<String>,
    #[serde(default, rename = "pathc_capctcha_extension")]
    pub captcha_extension: Option<PathBuf>,
    #[serde(default)]
    pub block_images: bool,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl FromStr for RunConfig {
    type Err = EngineError;

    fn from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        content.parse()
    }

    pub fn extension_paths(&self) -> Vec<PathBuf> {
        self.captcha_extension
            .iter()
            .filter(|path| !path.as_os_str().is_empty())
            .cloned()
            .collect()
    }

    /// Static checks over the graph. Problems are reported, not enforced:
    /// unknown methods still fail at resolution time.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.steps.contains(&self.first_step) {
            warnings.push(format!(
                "first_step '{}' is not defined in steps",
                self.first_step
            ));
        }

        for (name, step) in self.steps.iter() {
            if let Some(next) = step.successor()
                && !self.steps.contains(next)
            {
                warnings.push(format!(
                    "step '{}' has next_step '{}' which is not defined",
                    name, next
                ));
            }

            if let StepAction::CheckElement { elements } = &step.action {
                for item in elements {
                    if let Some(target) = item.rollback_target()
                        && !self.steps.contains(target)
                    {
                        warnings.push(format!(
                            "step '{}' has rollback '{}' which is not defined",
                            name, target
                        ));
                    }
                }
            }

            for locator in step.action.locators() {
                if locator.method.parse::<LocatorMethod>().is_err() {
                    warnings.push(format!(
                        "step '{}' uses unknown locator method '{}'",
                        name, locator.method
                    ));
                }
            }

            for action in step.action.element_actions() {
                if action.method.parse::<ActionMethod>().is_err() {
                    warnings.push(format!(
                        "step '{}' uses unknown element action '{}'",
                        name, action.method
                    ));
                }
            }

            if step.in_popup && step.create_popup {
                warnings.push(format!(
                    "step '{}' both targets and creates a popup; nested popups are not tracked",
                    name
                ));
            }
        }

        warnings
    }
}
