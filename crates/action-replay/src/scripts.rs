//! In-page scripts evaluated through `Runtime.evaluate`.
//!
//! Both scripts resolve the locator with `document.evaluate` and answer with a plain object:
//! `{ ok, code?, error?, x?, y?, tagName?, kind? }`. `code` is one of `not_found`,
//! `invalid_xpath`, `zero_size`, `not_interactable`, `unsupported`.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::ResolveFailure;

fn js_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

const RESOLVE: &str = r#"
  let el;
  try {
    el = document.evaluate(xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
  } catch (e) {
    return { ok: false, code: 'invalid_xpath', error: String(e && e.message ? e.message : e) };
  }
  if (!el) return { ok: false, code: 'not_found' };
  if (el.scrollIntoView) el.scrollIntoView({ block: 'center', inline: 'center' });
"#;

/// Scroll the element into view and report its rounded center.
pub fn clickable_point(xpath: &str) -> String {
    format!(
        r#"(function() {{
  const xpath = {xpath};
{RESOLVE}
  const rect = el.getBoundingClientRect();
  if (!rect || rect.width === 0 || rect.height === 0) return {{ ok: false, code: 'zero_size' }};
  const style = window.getComputedStyle(el);
  if (style && (style.visibility === 'hidden' || style.display === 'none' || style.pointerEvents === 'none')) {{
    return {{ ok: false, code: 'not_interactable' }};
  }}
  return {{
    ok: true,
    x: Math.round(rect.left + rect.width / 2),
    y: Math.round(rect.top + rect.height / 2),
    tagName: el.tagName
  }};
}})()"#,
        xpath = js_literal(xpath),
    )
}

/// Focus the element and set its value so framework listeners observe the change.
pub fn set_value(xpath: &str, value: &str) -> String {
    format!(
        r#"(function() {{
  const xpath = {xpath};
  const value = {value};
{RESOLVE}
  if (el.focus) el.focus();
  const tag = (el.tagName || '').toUpperCase();
  const notify = () => {{
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  }};
  if (tag === 'SELECT') {{
    el.value = value;
    notify();
    return {{ ok: true, kind: 'select', tagName: el.tagName }};
  }}
  if (tag === 'INPUT' || tag === 'TEXTAREA') {{
    const proto = tag === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    if (desc && typeof desc.set === 'function') desc.set.call(el, value);
    else el.value = value;
    notify();
    return {{ ok: true, kind: 'input', tagName: el.tagName }};
  }}
  if (el.isContentEditable) {{
    el.textContent = value;
    notify();
    return {{ ok: true, kind: 'contenteditable', tagName: el.tagName }};
  }}
  return {{ ok: false, code: 'unsupported', tagName: el.tagName }};
}})()"#,
        xpath = js_literal(xpath),
        value = js_literal(value),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutcome {
    #[serde(default)]
    pub ok: bool,
    pub code: Option<String>,
    pub error: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub tag_name: Option<String>,
    pub kind: Option<String>,
}

/// Failure reported by a script that did not return `ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptFailure {
    Resolve(ResolveFailure),
    Unsupported { tag: String },
}

impl ScriptOutcome {
    pub fn parse(value: Value) -> Result<Self, ScriptFailure> {
        serde_json::from_value(value.clone()).map_err(|_| {
            ScriptFailure::Resolve(ResolveFailure::Malformed(value.to_string()))
        })
    }

    pub fn failure(&self) -> Option<ScriptFailure> {
        if self.ok {
            return None;
        }
        let reason = match self.code.as_deref() {
            Some("not_found") => ResolveFailure::NotFound,
            Some("invalid_xpath") => {
                ResolveFailure::InvalidXPath(self.error.clone().unwrap_or_default())
            }
            Some("zero_size") => ResolveFailure::ZeroSize,
            Some("not_interactable") => ResolveFailure::NotInteractable,
            Some("unsupported") => {
                return Some(ScriptFailure::Unsupported {
                    tag: self
                        .tag_name
                        .as_deref()
                        .unwrap_or("unknown")
                        .to_ascii_lowercase(),
                })
            }
            other => ResolveFailure::Malformed(
                self.error
                    .clone()
                    .or_else(|| other.map(str::to_string))
                    .unwrap_or_else(|| "script reported failure".to_string()),
            ),
        };
        Some(ScriptFailure::Resolve(reason))
    }

    /// Click coordinates, when the script produced both.
    pub fn point(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}
