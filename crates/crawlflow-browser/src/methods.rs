//! Capability tables for locator resolution and element actions.
//!
//! Run documents name page capabilities with their Playwright (Python API)
//! names, e.g. `get_by_text` or `inner_html`. Each name maps to exactly one
//! variant here; anything else is rejected with [`DriverError::Unsupported`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DriverError;

/// How a page element is located.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LocatorMethod {
    Locator,
    GetByText,
    GetByRole,
    GetByLabel,
    GetByPlaceholder,
    GetByAltText,
    GetByTitle,
    GetByTestId,
}

impl LocatorMethod {
    pub const ALL: [LocatorMethod; 8] = [
        LocatorMethod::Locator,
        LocatorMethod::GetByText,
        LocatorMethod::GetByRole,
        LocatorMethod::GetByLabel,
        LocatorMethod::GetByPlaceholder,
        LocatorMethod::GetByAltText,
        LocatorMethod::GetByTitle,
        LocatorMethod::GetByTestId,
    ];

    /// Name used in run documents.
    pub fn as_str(self) -> &'static str {
        match self {
            LocatorMethod::Locator => "locator",
            LocatorMethod::GetByText => "get_by_text",
            LocatorMethod::GetByRole => "get_by_role",
            LocatorMethod::GetByLabel => "get_by_label",
            LocatorMethod::GetByPlaceholder => "get_by_placeholder",
            LocatorMethod::GetByAltText => "get_by_alt_text",
            LocatorMethod::GetByTitle => "get_by_title",
            LocatorMethod::GetByTestId => "get_by_test_id",
        }
    }

    /// Method name on a Playwright `Page` in the Node.js API.
    pub fn js_name(self) -> &'static str {
        match self {
            LocatorMethod::Locator => "locator",
            LocatorMethod::GetByText => "getByText",
            LocatorMethod::GetByRole => "getByRole",
            LocatorMethod::GetByLabel => "getByLabel",
            LocatorMethod::GetByPlaceholder => "getByPlaceholder",
            LocatorMethod::GetByAltText => "getByAltText",
            LocatorMethod::GetByTitle => "getByTitle",
            LocatorMethod::GetByTestId => "getByTestId",
        }
    }
}

impl FromStr for LocatorMethod {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LocatorMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| DriverError::Unsupported(format!("locator method '{}'", s)))
    }
}

impl fmt::Display for LocatorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a resolved element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionMethod {
    Click,
    Dblclick,
    Fill,
    Type,
    Press,
    Check,
    Uncheck,
    Hover,
    Focus,
    SelectOption,
    SetInputFiles,
    InnerHtml,
    InnerText,
    TextContent,
    GetAttribute,
    InputValue,
    IsVisible,
    IsChecked,
    Count,
    WaitFor,
}

impl ActionMethod {
    pub const ALL: [ActionMethod; 20] = [
        ActionMethod::Click,
        ActionMethod::Dblclick,
        ActionMethod::Fill,
        ActionMethod::Type,
        ActionMethod::Press,
        ActionMethod::Check,
        ActionMethod::Uncheck,
        ActionMethod::Hover,
        ActionMethod::Focus,
        ActionMethod::SelectOption,
        ActionMethod::SetInputFiles,
        ActionMethod::InnerHtml,
        ActionMethod::InnerText,
        ActionMethod::TextContent,
        ActionMethod::GetAttribute,
        ActionMethod::InputValue,
        ActionMethod::IsVisible,
        ActionMethod::IsChecked,
        ActionMethod::Count,
        ActionMethod::WaitFor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionMethod::Click => "click",
            ActionMethod::Dblclick => "dblclick",
            ActionMethod::Fill => "fill",
            ActionMethod::Type => "type",
            ActionMethod::Press => "press",
            ActionMethod::Check => "check",
            ActionMethod::Uncheck => "uncheck",
            ActionMethod::Hover => "hover",
            ActionMethod::Focus => "focus",
            ActionMethod::SelectOption => "select_option",
            ActionMethod::SetInputFiles => "set_input_files",
            ActionMethod::InnerHtml => "inner_html",
            ActionMethod::InnerText => "inner_text",
            ActionMethod::TextContent => "text_content",
            ActionMethod::GetAttribute => "get_attribute",
            ActionMethod::InputValue => "input_value",
            ActionMethod::IsVisible => "is_visible",
            ActionMethod::IsChecked => "is_checked",
            ActionMethod::Count => "count",
            ActionMethod::WaitFor => "wait_for",
        }
    }

    /// Method name on a Playwright `Locator` in the Node.js API.
    pub fn js_name(self) -> &'static str {
        match self {
            ActionMethod::Click => "click",
            ActionMethod::Dblclick => "dblclick",
            ActionMethod::Fill => "fill",
            // `type` is deprecated in Node in favour of pressSequentially.
            ActionMethod::Type => "pressSequentially",
            ActionMethod::Press => "press",
            ActionMethod::Check => "check",
            ActionMethod::Uncheck => "uncheck",
            ActionMethod::Hover => "hover",
            ActionMethod::Focus => "focus",
            ActionMethod::SelectOption => "selectOption",
            ActionMethod::SetInputFiles => "setInputFiles",
            ActionMethod::InnerHtml => "innerHTML",
            ActionMethod::InnerText => "innerText",
            ActionMethod::TextContent => "textContent",
            ActionMethod::GetAttribute => "getAttribute",
            ActionMethod::InputValue => "inputValue",
            ActionMethod::IsVisible => "isVisible",
            ActionMethod::IsChecked => "isChecked",
            ActionMethod::Count => "count",
            ActionMethod::WaitFor => "waitFor",
        }
    }
}

impl FromStr for ActionMethod {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| DriverError::Unsupported(format!("element action '{}'", s)))
    }
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
