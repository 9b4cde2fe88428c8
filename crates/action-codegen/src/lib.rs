//! Test code generation from a recorded action log.
//!
//! Every action becomes one block headed by `// <description>`, in log order. Two dialects
//! are supported: [`Dialect::Fluent`] (Playwright locators, `xpath=` prefix) and
//! [`Dialect::Selector`] (Puppeteer page methods, `xpath/` prefix).

mod dialect;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use recorder_core_types::{plural_seconds, Action, ActionKind};

pub use dialect::{DialectWriter, FluentWriter, SelectorWriter};

pub const INHERITED_BACKGROUND_NOTE: &str =
    "// Note: This element has a transparent background and inherits the background color from its parent";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    Fluent,
    Selector,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Fluent => "fluent",
            Dialect::Selector => "selector",
        }
    }

    fn writer(&self) -> &'static dyn DialectWriter {
        match self {
            Dialect::Fluent => &FluentWriter,
            Dialect::Selector => &SelectorWriter,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = CodegenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fluent" | "playwright" => Ok(Dialect::Fluent),
            "selector" | "puppeteer" => Ok(Dialect::Selector),
            other => Err(CodegenError::UnknownDialect(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("unknown dialect '{0}' (expected fluent or selector)")]
    UnknownDialect(String),

    #[error("'{0}' is not a valid JavaScript identifier")]
    InvalidPageVariable(String),
}

/// Page variables are spliced into code verbatim, so they must be plain identifiers.
pub fn validate_page_variable(name: &str) -> Result<(), CodegenError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CodegenError::InvalidPageVariable(name.to_string()))
    }
}

/// Escape `value` for use inside a single-quoted JavaScript string.
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

fn comment_line(text: &str) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("// {flat}\n")
}

/// Render `actions` as source text for `dialect`, using `page` as the page variable.
pub fn generate(actions: &[Action], dialect: Dialect, page: &str) -> String {
    let writer = dialect.writer();
    let mut code = String::new();
    for action in actions {
        code.push_str(&comment_line(&action.description));
        render_action(writer, &mut code, action, page);
    }
    debug!(
        target: "action-codegen",
        dialect = %dialect,
        actions = actions.len(),
        bytes = code.len(),
        "code generated"
    );
    code
}

fn render_action(writer: &dyn DialectWriter, code: &mut String, action: &Action, page: &str) {
    match action.kind {
        ActionKind::Comment => return,
        ActionKind::Wait => {
            let seconds = action.duration_seconds.unwrap_or(0);
            code.push_str(&format!(
                "// Active wait for {seconds} {}\n",
                plural_seconds(seconds)
            ));
            code.push_str(&writer.pause(page, action.wait_millis()));
            code.push('\n');
            return;
        }
        _ => {}
    }

    let Some(locator) = action.locator().filter(|l| !l.trim().is_empty()) else {
        code.push_str(&format!("// Skipped: {} action has no locator\n\n", action.kind));
        return;
    };
    let locator = js_string(locator);
    let value = js_string(action.value_or_empty());

    if action.kind.changes_page_state() {
        code.push_str(&writer.wait_visible(page, &locator));
    }
    match action.kind {
        ActionKind::Click => code.push_str(&writer.click(page, &locator)),
        ActionKind::Type => {
            if action.targets_contenteditable() {
                code.push_str(&writer.set_inner_html(page, &locator, &value));
            } else {
                code.push_str(&writer.fill(page, &locator, &value));
            }
        }
        ActionKind::Select => code.push_str(&writer.select(page, &locator, &value)),
        ActionKind::AssertText => code.push_str(&writer.expect_text(page, &locator, &value)),
        ActionKind::AssertColor => {
            code.push_str(&writer.expect_style(page, &locator, "color", &value))
        }
        ActionKind::AssertBackgroundColor => {
            if action.is_inherited_background() {
                code.push_str(INHERITED_BACKGROUND_NOTE);
                code.push('\n');
            }
            code.push_str(&writer.expect_style(page, &locator, "background-color", &value));
        }
        ActionKind::AssertVisible => code.push_str(&writer.expect_visible(page, &locator)),
        ActionKind::Comment | ActionKind::Wait => {}
    }
    code.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use recorder_core_types::AssertionKind;

    #[test]
    fn fluent_click_then_text_assertion() {
        let actions = vec![
            Action::click("//*[@id=\"save\"]", "Click on \"Save\""),
            Action::assertion(
                AssertionKind::Text,
                "//h1",
                Some("Done".to_string()),
                "Assert text \"Done\" exists",
            ),
        ];
        let code = generate(&actions, Dialect::Fluent, "page");
        assert_eq!(
            code,
            "// Click on \"Save\"\n\
             await page.locator('xpath=//*[@id=\"save\"]').waitFor({ state: 'visible' });\n\
             await page.locator('xpath=//*[@id=\"save\"]').click();\n\
             \n\
             // Assert text \"Done\" exists\n\
             await expect(page.locator('xpath=//h1')).toHaveText('Done');\n\
             \n"
        );
    }

    #[test]
    fn comment_is_written_once_and_wait_is_pluralized() {
        let actions = vec![Action::comment("login done"), Action::wait(1), Action::wait(2)];
        let code = generate(&actions, Dialect::Fluent, "adminPage");
        assert_eq!(code.matches("// login done").count(), 1);
        assert!(code.contains("// Active wait for 1 second\nawait adminPage.waitForTimeout(1000);"));
        assert!(code.contains("// Active wait for 2 seconds\nawait adminPage.waitForTimeout(2000);"));
    }

    #[test]
    fn selector_dialect_statements() {
        let actions = vec![
            Action::type_text("//input", "it's", "Type \"it's\" into input"),
            Action::select("//select", "de", "Select \"Germany\" from dropdown"),
            Action::assertion(AssertionKind::Visible, "//p", None, "Assert element is visible"),
            Action::wait(3),
        ];
        let code = generate(&actions, Dialect::Selector, "page");
        assert!(code.contains("await page.waitForSelector('xpath///input', { visible: true });"));
        assert!(code.contains("await page.type('xpath///input', 'it\\'s');"));
        assert!(code.contains("await page.select('xpath///select', 'de');"));
        assert!(code.contains(
            "expect(await page.waitForSelector('xpath///p', { visible: true })).toBeTruthy();"
        ));
        assert!(code.contains("await new Promise((resolve) => setTimeout(resolve, 3000));"));
    }

    #[test]
    fn inherited_background_gets_a_note() {
        let action = Action::assertion(
            AssertionKind::BackgroundColor,
            "//span",
            Some("rgb(255,255,255)".to_string()),
            "Assert inherited background color \"rgb(255,255,255)\" from parent div",
        )
        .with_inherited_from("div");
        let code = generate(&[action], Dialect::Fluent, "page");
        let lines: Vec<_> = code.lines().collect();
        assert_eq!(lines[1], INHERITED_BACKGROUND_NOTE);
        assert_eq!(
            lines[2],
            "await expect(page.locator('xpath=//span')).toHaveCSS('background-color', 'rgb(255,255,255)');"
        );
    }

    #[test]
    fn contenteditable_sets_inner_html() {
        let action = Action::type_text("//div", "<b>x</b>", "Type \"<b>x</b>\" into contenteditable div");
        let fluent = generate(&[action.clone()], Dialect::Fluent, "page");
        assert!(fluent.contains(
            "await page.locator('xpath=//div').evaluate((el) => { el.innerHTML = '<b>x</b>'; });"
        ));
        let selector = generate(&[action], Dialect::Selector, "page");
        assert!(selector.contains(
            "await page.$eval('xpath///div', (el) => { el.innerHTML = '<b>x</b>'; });"
        ));
    }

    #[test]
    fn order_is_preserved() {
        let actions: Vec<_> = (0..5)
            .map(|i| Action::click(format!("//*[@id=\"b{i}\"]"), format!("step {i}")))
            .collect();
        let code = generate(&actions, Dialect::Selector, "page");
        let positions: Vec<_> = (0..5)
            .map(|i| code.find(&format!("// step {i}\n")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn escaping_and_validation() {
        assert_eq!(js_string("a'b\\c\nd"), "a\\'b\\\\c\\nd");
        assert!(validate_page_variable("page").is_ok());
        assert!(validate_page_variable("$page_2").is_ok());
        assert!(validate_page_variable("2page").is_err());
        assert!(validate_page_variable("page; alert(1)").is_err());
        assert_eq!("puppeteer".parse::<Dialect>().unwrap(), Dialect::Selector);
        assert!("cypress".parse::<Dialect>().is_err());
    }
}
