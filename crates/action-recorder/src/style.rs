//! Computed style lookup.

use action_locator::{NodeId, PageDom};
use csscolorparser::Color;

pub const DEFAULT_COLOR: &str = "rgb(0, 0, 0)";
pub const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";

/// Source of computed style values for captured elements.
pub trait StyleSource: Send + Sync {
    fn computed(&self, dom: &PageDom, node: NodeId, property: &str) -> String;
}

/// Reads inline `style` declarations. `color` inherits from ancestors; `background-color`
/// only honours an explicit `inherit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineStyleSource;

impl InlineStyleSource {
    fn declared(dom: &PageDom, node: NodeId, property: &str) -> Option<String> {
        let style = dom.attr(node, "style")?;
        let mut found = None;
        for declaration in style.split(';') {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            if value.is_empty() {
                continue;
            }
            if name == property {
                found = Some(value.to_string());
            } else if property == "background-color" && name == "background" && is_color(value)
            {
                found = Some(value.to_string());
            }
        }
        found
    }
}

impl StyleSource for InlineStyleSource {
    fn computed(&self, dom: &PageDom, node: NodeId, property: &str) -> String {
        let inherits = property == "color";
        let mut current = Some(node);
        while let Some(id) = current.filter(|id| dom.is_element(*id)) {
            match Self::declared(dom, id, property) {
                Some(value) if value.eq_ignore_ascii_case("inherit") => {}
                Some(value) => return value,
                None if !inherits => break,
                None => {}
            }
            current = dom.parent(id);
        }
        if inherits {
            DEFAULT_COLOR.to_string()
        } else {
            TRANSPARENT.to_string()
        }
    }
}

fn is_color(value: &str) -> bool {
    value.parse::<Color>().is_ok()
}

/// `transparent` or any color whose alpha channel is zero.
pub fn is_transparent(value: &str) -> bool {
    match value.trim().parse::<Color>() {
        Ok(color) => color.to_rgba8()[3] == 0,
        Err(_) => value.trim().eq_ignore_ascii_case("transparent"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_inherits_background_does_not() {
        let dom = PageDom::parse(
            r#"<div style="color: rgb(10, 20, 30); background-color: #fff"><span id="s">x</span></div>"#,
        )
        .unwrap();
        let span = dom.element_by_id("s").unwrap();
        let source = InlineStyleSource;
        assert_eq!(source.computed(&dom, span, "color"), "rgb(10, 20, 30)");
        assert_eq!(source.computed(&dom, span, "background-color"), TRANSPARENT);
    }

    #[test]
    fn defaults_and_shorthand() {
        let dom = PageDom::parse(
            r#"<p id="a">x</p><p id="b" style="background: red !important">y</p>"#,
        )
        .unwrap();
        let source = InlineStyleSource;
        let a = dom.element_by_id("a").unwrap();
        let b = dom.element_by_id("b").unwrap();
        assert_eq!(source.computed(&dom, a, "color"), DEFAULT_COLOR);
        assert_eq!(source.computed(&dom, b, "background-color"), "red");
    }

    #[test]
    fn transparency() {
        assert!(is_transparent("transparent"));
        assert!(is_transparent("rgba(0, 0, 0, 0)"));
        assert!(is_transparent("rgba(255,255,255,0)"));
        assert!(!is_transparent("rgb(255,255,255)"));
        assert!(!is_transparent("#000"));
    }
}
