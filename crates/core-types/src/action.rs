//! Recorded action model.
//!
//! Actions are persisted as JSON. The reader also accepts the field and kind names written by
//! the browser extension (`selector`, `expectedText`, `color-assertion`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a recorded step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "click")]
    Click,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "assertion-text", alias = "assertion")]
    AssertText,
    #[serde(rename = "assertion-color", alias = "color-assertion")]
    AssertColor,
    #[serde(
        rename = "assertion-background-color",
        alias = "background-color-assertion"
    )]
    AssertBackgroundColor,
    #[serde(rename = "assertion-visible", alias = "visible")]
    AssertVisible,
    #[serde(rename = "comment")]
    Comment,
    #[serde(rename = "wait")]
    Wait,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Select => "select",
            ActionKind::AssertText => "assertion-text",
            ActionKind::AssertColor => "assertion-color",
            ActionKind::AssertBackgroundColor => "assertion-background-color",
            ActionKind::AssertVisible => "assertion-visible",
            ActionKind::Comment => "comment",
            ActionKind::Wait => "wait",
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            ActionKind::AssertText
                | ActionKind::AssertColor
                | ActionKind::AssertBackgroundColor
                | ActionKind::AssertVisible
        )
    }

    /// Everything except comment and wait targets an element.
    pub fn needs_locator(&self) -> bool {
        !matches!(self, ActionKind::Comment | ActionKind::Wait)
    }

    /// Steps after which replay inserts the settle delay.
    pub fn changes_page_state(&self) -> bool {
        matches!(self, ActionKind::Click | ActionKind::Type | ActionKind::Select)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assertion the next click captures while the recorder is armed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionKind {
    Text,
    Color,
    BackgroundColor,
    Visible,
}

impl AssertionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionKind::Text => "text",
            AssertionKind::Color => "color",
            AssertionKind::BackgroundColor => "background-color",
            AssertionKind::Visible => "visible",
        }
    }

    pub fn action_kind(&self) -> ActionKind {
        match self {
            AssertionKind::Text => ActionKind::AssertText,
            AssertionKind::Color => ActionKind::AssertColor,
            AssertionKind::BackgroundColor => ActionKind::AssertBackgroundColor,
            AssertionKind::Visible => ActionKind::AssertVisible,
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssertionKind {
    type Err = ActionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(AssertionKind::Text),
            "color" => Ok(AssertionKind::Color),
            "background-color" | "background" | "bg" => Ok(AssertionKind::BackgroundColor),
            "visible" => Ok(AssertionKind::Visible),
            other => Err(ActionError::UnknownAssertion(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{kind} action requires a non-empty locator")]
    MissingLocator { kind: ActionKind },
    #[error("wait action requires a positive duration")]
    MissingDuration,
    #[error("comment text must not be empty")]
    EmptyComment,
    #[error("unknown assertion kind '{0}'")]
    UnknownAssertion(String),
}

/// One recorded step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(alias = "type")]
    pub kind: ActionKind,
    #[serde(default, alias = "selector", skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(
        default,
        alias = "expectedText",
        alias = "expectedColor",
        alias = "expectedBgColor",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    /// Tag of the ancestor that supplied an inherited background color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Action {
    fn targeted(kind: ActionKind, locator: impl Into<String>, description: String) -> Self {
        Self {
            kind,
            locator: Some(locator.into()),
            value: None,
            description,
            duration_seconds: None,
            inherited_from: None,
            timestamp: None,
        }
    }

    pub fn click(locator: impl Into<String>, description: impl Into<String>) -> Self {
        Self::targeted(ActionKind::Click, locator, description.into())
    }

    pub fn type_text(
        locator: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let mut action = Self::targeted(ActionKind::Type, locator, description.into());
        action.value = Some(value.into());
        action
    }

    pub fn select(
        locator: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let mut action = Self::targeted(ActionKind::Select, locator, description.into());
        action.value = Some(value.into());
        action
    }

    pub fn assertion(
        kind: AssertionKind,
        locator: impl Into<String>,
        expected: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        let mut action = Self::targeted(kind.action_kind(), locator, description.into());
        action.value = expected;
        action
    }

    /// Free-text checkpoint.
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Comment,
            locator: None,
            value: None,
            description: text.into(),
            duration_seconds: None,
            inherited_from: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Fixed pause of `seconds`.
    pub fn wait(seconds: u64) -> Self {
        Self {
            kind: ActionKind::Wait,
            locator: None,
            value: None,
            description: format!("{seconds} {}", plural_seconds(seconds)),
            duration_seconds: Some(seconds),
            inherited_from: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn with_inherited_from(mut self, tag: impl Into<String>) -> Self {
        self.inherited_from = Some(tag.into());
        self
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn value_or_empty(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn wait_millis(&self) -> u64 {
        self.duration_seconds.unwrap_or(0).saturating_mul(1000)
    }

    pub fn targets_contenteditable(&self) -> bool {
        self.description.contains("contenteditable")
    }

    pub fn is_inherited_background(&self) -> bool {
        self.inherited_from.is_some() || self.description.contains("inherited")
    }

    pub fn validate(&self) -> Result<(), ActionError> {
        match self.kind {
            ActionKind::Comment if self.description.trim().is_empty() => {
                Err(ActionError::EmptyComment)
            }
            ActionKind::Wait if self.duration_seconds.unwrap_or(0) == 0 => {
                Err(ActionError::MissingDuration)
            }
            kind if kind.needs_locator()
                && self.locator.as_deref().map_or(true, |l| l.trim().is_empty()) =>
            {
                Err(ActionError::MissingLocator { kind })
            }
            _ => Ok(()),
        }
    }
}

/// `second` or `seconds`.
pub fn plural_seconds(seconds: u64) -> &'static str {
    if seconds == 1 {
        "second"
    } else {
        "seconds"
    }
}
