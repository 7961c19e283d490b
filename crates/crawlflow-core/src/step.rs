//! Declarative step model.
//!
//! A run document carries a [`StepGraph`]: named steps, each tagged with a
//! `type` and an optional `next_step`. Traversal order is decided at run time
//! by successors and rollback overrides, never by the order of the keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Diagnostic label of a step. Documents use both numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepId {
    Number(i64),
    Text(String),
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepId::Number(id) => write!(f, "{}", id),
            StepId::Text(id) => f.write_str(id),
        }
    }
}

/// How to find an element: a page capability name, its argument and
/// matching options (e.g. `{"exact": true}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    pub method: String,
    pub value: String,
    #[serde(default)]
    pub extras: Map<String, Value>,
}

impl Locator {
    pub fn new(method: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            value: value.into(),
            extras: Map::new(),
        }
    }
}

/// What to do with a resolved element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementAction {
    pub method: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub extras: Map<String, Value>,
    #[serde(default)]
    pub is_attachment: bool,
}

/// Visibility gate with a bounded retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    pub element: Locator,
    /// Step to jump to instead of the normal successor.
    #[serde(default)]
    pub rollback: Option<String>,
    /// Remaining retries for this item within the run.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub reload: bool,
    #[serde(default)]
    pub goto: Option<String>,
}

impl CheckItem {
    pub fn rollback_target(&self) -> Option<&str> {
        non_empty(self.rollback.as_deref())
    }

    pub fn goto_url(&self) -> Option<&str> {
        non_empty(self.goto.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub element: Locator,
    pub element_action: ElementAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractTarget {
    #[serde(default)]
    pub filename: Option<PathBuf>,
}

/// Form field or click target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionItem {
    pub element: Locator,
    pub element_action: ElementAction,
    /// Timeouts on this item are logged and skipped.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub is_attachment: bool,
}

impl InteractionItem {
    pub fn is_attachment(&self) -> bool {
        self.is_attachment || self.element_action.is_attachment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitItem {
    pub element: Locator,
}

/// Per-type payload of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    Navigation {
        url: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    CheckElement {
        elements: Vec<CheckItem>,
    },
    ExtractContent {
        contents: Vec<ContentItem>,
        #[serde(default)]
        target: Option<ExtractTarget>,
    },
    Form {
        form: Vec<InteractionItem>,
    },
    Click {
        clicks: Vec<InteractionItem>,
    },
    WaitFor {
        elements: Vec<WaitItem>,
    },
    Sleep {
        /// Seconds.
        time: f64,
    },
    StoreUrl,
    DownloadPage {
        filename: PathBuf,
    },
    SolverCaptcha {
        #[serde(default)]
        recaptchav2: bool,
        #[serde(default)]
        imagecaptcha: bool,
        #[serde(default)]
        image_path: Option<PathBuf>,
    },
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Navigation { .. } => "navigation",
            StepAction::CheckElement { .. } => "check_element",
            StepAction::ExtractContent { .. } => "extract_content",
            StepAction::Form { .. } => "form",
            StepAction::Click { .. } => "click",
            StepAction::WaitFor { .. } => "wait_for",
            StepAction::Sleep { .. } => "sleep",
            StepAction::StoreUrl => "store_url",
            StepAction::DownloadPage { .. } => "download_page",
            StepAction::SolverCaptcha { .. } => "solver_captcha",
        }
    }

    /// Every locator the step will resolve, in declaration order.
    pub fn locators(&self) -> Vec<&Locator> {
        match self {
            StepAction::CheckElement { elements } => {
                elements.iter().map(|item| &item.element).collect()
            }
            StepAction::ExtractContent { contents, .. } => {
                contents.iter().map(|item| &item.element).collect()
            }
            StepAction::Form { form: items } | StepAction::Click { clicks: items } => {
                items.iter().map(|item| &item.element).collect()
            }
            StepAction::WaitFor { elements } => elements.iter().map(|item| &item.element).collect(),
            _ => Vec::new(),
        }
    }

    /// Every element action the step will invoke, in declaration order.
    pub fn element_actions(&self) -> Vec<&ElementAction> {
        match self {
            StepAction::ExtractContent { contents, .. } => {
                contents.iter().map(|item| &item.element_action).collect()
            }
            StepAction::Form { form: items } | StepAction::Click { clicks: items } => {
                items.iter().map(|item| &item.element_action).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: Option<StepId>,
    #[serde(default)]
    pub next_step: Option<String>,
    /// Route this step at the popup instead of the page.
    #[serde(default)]
    pub in_popup: bool,
    /// Run this step inside a popup-capture scope.
    #[serde(default)]
    pub create_popup: bool,
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    pub fn new(action: StepAction) -> Self {
        Self {
            id: None,
            next_step: None,
            in_popup: false,
            create_popup: false,
            action,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next_step = Some(next.into());
        self
    }

    pub fn kind(&self) -> &'static str {
        self.action.kind()
    }

    pub fn id_label(&self) -> String {
        self.id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "id-undefined".to_string())
    }

    /// Declared successor; empty names terminate the walk like absent ones.
    pub fn successor(&self) -> Option<&str> {
        non_empty(self.next_step.as_deref())
    }
}

/// Named steps of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepGraph(BTreeMap<String, Step>);

impl StepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, step: Step) -> Option<Step> {
        self.0.insert(name.into(), step)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Step)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Step)> for StepGraph {
    fn from_iter<I: IntoIterator<Item = (String, Step)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
