//! DOM event capture.
//!
//! The agent consumes page events, gates them on the [`RecorderState`], synthesizes a
//! locator for the target and turns the event into an [`Action`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use action_locator::{xpath, LocatorError, NodeId, PageDom, Synthesizer};
use recorder_core_types::{Action, AssertionKind, ControlMessage};

use crate::errors::CaptureError;
use crate::state::{RecorderState, Transition};
use crate::style::{is_transparent, InlineStyleSource, StyleSource};

pub const DESCRIPTION_LIMIT: usize = 40;
pub const NO_LOCATOR_ALERT: &str =
    "No selector found for the selected element, please contact the developers";
pub const HOVER_CLASS: &str = "recorder-hover";

/// Page-level events observed by the capture agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Click { target: NodeId },
    /// `value` is the control's value after the change.
    Change { target: NodeId, value: String },
    MouseOver { target: NodeId },
    MouseOut { target: NodeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Highlight {
    Add { node: NodeId, class: String },
    Clear { node: NodeId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Recorded(Action),
    /// No locator could be produced; the click is swallowed and the user alerted.
    Blocked { alert: String },
    Highlight(Highlight),
    Ignored,
}

impl CaptureOutcome {
    /// Message to forward to the coordinator, if any.
    pub fn into_message(self) -> Option<ControlMessage> {
        match self {
            CaptureOutcome::Recorded(action) => Some(ControlMessage::ActionRecorded { action }),
            _ => None,
        }
    }
}

/// Highlight class for the current state.
pub fn highlight_class(state: RecorderState) -> String {
    match state.armed() {
        Some(kind) => format!("recorder-assertion-{kind}"),
        None => HOVER_CLASS.to_string(),
    }
}

/// Cut `text` to `limit` characters, appending `...` when shortened.
pub fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

pub struct CaptureAgent<S = InlineStyleSource> {
    state: RecorderState,
    style: S,
}

impl Default for CaptureAgent<InlineStyleSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureAgent<InlineStyleSource> {
    pub fn new() -> Self {
        Self::with_style_source(InlineStyleSource)
    }
}

impl<S: StyleSource> CaptureAgent<S> {
    pub fn with_style_source(style: S) -> Self {
        Self {
            state: RecorderState::Idle,
            style,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn apply(&mut self, transition: Transition) -> RecorderState {
        let next = self.state.next(transition);
        if next != self.state {
            debug!(
                target: "action-recorder",
                from = %self.state.label(),
                to = %next.label(),
                "recorder state changed"
            );
        }
        self.state = next;
        next
    }

    /// Apply a control message; returns whether it was a recorder transition.
    pub fn handle_control(&mut self, message: &ControlMessage) -> bool {
        match Transition::from_message(message) {
            Some(transition) => {
                self.apply(transition);
                true
            }
            None => false,
        }
    }

    pub fn handle_event(
        &mut self,
        dom: &PageDom,
        event: &PageEvent,
    ) -> Result<CaptureOutcome, CaptureError> {
        let target = match event {
            PageEvent::Click { target }
            | PageEvent::Change { target, .. }
            | PageEvent::MouseOver { target }
            | PageEvent::MouseOut { target } => *target,
        };
        if dom.node(target).is_none() {
            return Err(CaptureError::UnknownNode(target));
        }

        match event {
            PageEvent::Click { target } => self.on_click(dom, *target),
            PageEvent::Change { target, value } => self.on_change(dom, *target, value),
            PageEvent::MouseOver { target } if self.state.is_active() => {
                Ok(CaptureOutcome::Highlight(Highlight::Add {
                    node: *target,
                    class: highlight_class(self.state),
                }))
            }
            PageEvent::MouseOut { target } if self.state.is_active() => {
                Ok(CaptureOutcome::Highlight(Highlight::Clear { node: *target }))
            }
            PageEvent::MouseOver { .. } | PageEvent::MouseOut { .. } => {
                Ok(CaptureOutcome::Ignored)
            }
        }
    }

    fn locate(&self, dom: &PageDom, target: NodeId) -> Result<Option<String>, CaptureError> {
        match Synthesizer::new(dom).locator_for(target) {
            Ok(locator) => Ok(Some(locator)),
            Err(err) if err.is_user_visible() => {
                warn!(target: "action-recorder", node = target, %err, "no locator for target");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn on_click(&mut self, dom: &PageDom, target: NodeId) -> Result<CaptureOutcome, CaptureError> {
        if !self.state.is_active() {
            return Ok(CaptureOutcome::Ignored);
        }
        let Some(locator) = self.locate(dom, target)? else {
            return Ok(CaptureOutcome::Blocked {
                alert: NO_LOCATOR_ALERT.to_string(),
            });
        };

        let action = match self.state.armed() {
            None => {
                let text = dom.text_content(target);
                let text = text.trim();
                let label = if text.is_empty() {
                    dom.tag(target).unwrap_or_default()
                } else {
                    text
                };
                Action::click(
                    locator,
                    format!("Click on \"{}\"", truncate_text(label, DESCRIPTION_LIMIT)),
                )
            }
            Some(kind) => {
                let action = self.assertion(dom, target, kind, locator);
                self.apply(Transition::Disarm);
                action
            }
        };
        debug!(
            target: "action-recorder",
            kind = %action.kind,
            locator = action.locator().unwrap_or_default(),
            "action captured"
        );
        Ok(CaptureOutcome::Recorded(action))
    }

    fn assertion(
        &self,
        dom: &PageDom,
        target: NodeId,
        kind: AssertionKind,
        locator: String,
    ) -> Action {
        match kind {
            AssertionKind::Text => {
                let text = dom.text_content(target).trim().to_string();
                let description = format!(
                    "Assert text \"{}\" exists",
                    truncate_text(&text, DESCRIPTION_LIMIT)
                );
                Action::assertion(kind, locator, Some(text), description)
            }
            AssertionKind::Color => {
                let color = self.style.computed(dom, target, "color");
                let description = format!("Assert color is \"{color}\"");
                Action::assertion(kind, locator, Some(color), description)
            }
            AssertionKind::BackgroundColor => {
                let own = self.style.computed(dom, target, "background-color");
                match self.inherited_background(dom, target, &own) {
                    Some((color, tag)) => {
                        let description = format!(
                            "Assert inherited background color \"{color}\" from parent {tag}"
                        );
                        Action::assertion(kind, locator, Some(color), description)
                            .with_inherited_from(tag)
                    }
                    None => {
                        let description = format!("Assert background color is \"{own}\"");
                        Action::assertion(kind, locator, Some(own), description)
                    }
                }
            }
            AssertionKind::Visible => {
                Action::assertion(kind, locator, None, "Assert element is visible")
            }
        }
    }

    /// First non-transparent ancestor background below `body`.
    fn inherited_background(
        &self,
        dom: &PageDom,
        target: NodeId,
        own: &str,
    ) -> Option<(String, String)> {
        if !is_transparent(own) {
            return None;
        }
        dom.ancestors(target)
            .take_while(|id| dom.is_element(*id) && dom.tag(*id) != Some("body"))
            .find_map(|id| {
                let color = self.style.computed(dom, id, "background-color");
                if is_transparent(&color) {
                    None
                } else {
                    Some((color, dom.tag(id).unwrap_or_default().to_string()))
                }
            })
    }

    fn on_change(
        &mut self,
        dom: &PageDom,
        target: NodeId,
        value: &str,
    ) -> Result<CaptureOutcome, CaptureError> {
        if !self.state.records_changes() {
            return Ok(CaptureOutcome::Ignored);
        }
        let tag = dom.tag(target).unwrap_or_default();
        let editable = dom
            .attr(target, "contenteditable")
            .map_or(false, |v| !v.eq_ignore_ascii_case("false"));
        if !matches!(tag, "input" | "textarea" | "select") && !editable {
            return Ok(CaptureOutcome::Ignored);
        }
        let Some(locator) = self.locate(dom, target)? else {
            return Ok(CaptureOutcome::Blocked {
                alert: NO_LOCATOR_ALERT.to_string(),
            });
        };

        let action = if tag == "select" {
            let label = option_label(dom, target, value);
            Action::select(locator, value, format!("Select \"{label}\" from dropdown"))
        } else if editable && !matches!(tag, "input" | "textarea") {
            Action::type_text(
                locator,
                value,
                format!("Type \"{value}\" into contenteditable {tag}"),
            )
        } else {
            let into = dom
                .attr(target, "placeholder")
                .filter(|p| !p.is_empty())
                .unwrap_or(tag);
            Action::type_text(locator, value, format!("Type \"{value}\" into {into}"))
        };
        Ok(CaptureOutcome::Recorded(action))
    }
}

/// Text of the option carrying `value`, falling back to the value itself.
fn option_label(dom: &PageDom, select: NodeId, value: &str) -> String {
    dom.subtree(select)
        .into_iter()
        .filter(|id| dom.tag(*id) == Some("option"))
        .find(|id| {
            let text = dom.text_content(*id);
            dom.attr(*id, "value").unwrap_or(text.trim()) == value
        })
        .map(|id| dom.text_content(id).trim().to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Event addressed by locator, as written in capture scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptedEvent {
    Click { target: String },
    Change { target: String, value: String },
    MouseOver { target: String },
    MouseOut { target: String },
}

impl ScriptedEvent {
    /// Resolve the target locator to the first matching element.
    pub fn resolve(&self, dom: &PageDom) -> Result<PageEvent, CaptureError> {
        let locator = match self {
            ScriptedEvent::Click { target }
            | ScriptedEvent::Change { target, .. }
            | ScriptedEvent::MouseOver { target }
            | ScriptedEvent::MouseOut { target } => target,
        };
        let node = xpath::select(dom, locator)
            .map_err(LocatorError::from)?
            .into_iter()
            .next()
            .ok_or_else(|| CaptureError::TargetNotFound(locator.clone()))?;
        Ok(match self {
            ScriptedEvent::Click { .. } => PageEvent::Click { target: node },
            ScriptedEvent::Change { value, .. } => PageEvent::Change {
                target: node,
                value: value.clone(),
            },
            ScriptedEvent::MouseOver { .. } => PageEvent::MouseOver { target: node },
            ScriptedEvent::MouseOut { .. } => PageEvent::MouseOut { target: node },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recorder_core_types::ActionKind;

    fn recording_agent() -> CaptureAgent {
        let mut agent = CaptureAgent::new();
        agent.apply(Transition::SetRecording(true));
        agent
    }

    fn node(dom: &PageDom, locator: &str) -> NodeId {
        xpath::select(dom, locator).unwrap()[0]
    }

    #[test]
    fn click_on_save_button() {
        let dom = PageDom::parse(r#"<button id="save-btn">Save</button>"#).unwrap();
        let mut agent = recording_agent();
        let target = dom.element_by_id("save-btn").unwrap();
        let outcome = agent
            .handle_event(&dom, &PageEvent::Click { target })
            .unwrap();
        let CaptureOutcome::Recorded(action) = outcome else {
            panic!("expected a recorded action");
        };
        assert_eq!(action.kind, ActionKind::Click);
        assert_eq!(action.locator(), Some(r#"//*[@id="save-btn"]"#));
        assert_eq!(action.description, r#"Click on "Save""#);
    }

    #[test]
    fn idle_agent_ignores_everything() {
        let dom = PageDom::parse(r#"<input id="q">"#).unwrap();
        let mut agent = CaptureAgent::new();
        let target = dom.element_by_id("q").unwrap();
        for event in [
            PageEvent::Click { target },
            PageEvent::Change {
                target,
                value: "x".into(),
            },
            PageEvent::MouseOver { target },
        ] {
            assert_eq!(agent.handle_event(&dom, &event).unwrap(), CaptureOutcome::Ignored);
        }
    }

    #[test]
    fn long_click_labels_are_truncated() {
        let dom = PageDom::parse(
            "<a id=\"l\">This link text is definitely longer than forty characters</a>",
        )
        .unwrap();
        let mut agent = recording_agent();
        let target = dom.element_by_id("l").unwrap();
        let CaptureOutcome::Recorded(action) =
            agent.handle_event(&dom, &PageEvent::Click { target }).unwrap()
        else {
            panic!("expected a recorded action");
        };
        assert_eq!(
            action.description,
            "Click on \"This link text is definitely longer than...\""
        );
    }

    #[test]
    fn inherited_background_from_div() {
        let dom = PageDom::parse(
            r#"<div style="background-color: rgb(255,255,255)">
                 <span id="t" style="background-color: transparent">x</span>
               </div>"#,
        )
        .unwrap();
        let mut agent = recording_agent();
        agent.apply(Transition::ArmAssertion(AssertionKind::BackgroundColor));
        let target = dom.element_by_id("t").unwrap();
        let CaptureOutcome::Recorded(action) =
            agent.handle_event(&dom, &PageEvent::Click { target }).unwrap()
        else {
            panic!("expected a recorded action");
        };
        assert_eq!(action.kind, ActionKind::AssertBackgroundColor);
        assert_eq!(action.value.as_deref(), Some("rgb(255,255,255)"));
        assert_eq!(action.inherited_from.as_deref(), Some("div"));
        assert_eq!(
            action.description,
            r#"Assert inherited background color "rgb(255,255,255)" from parent div"#
        );
        assert_eq!(agent.state(), RecorderState::Recording);
    }

    #[test]
    fn transparent_all_the_way_up_is_recorded_as_is() {
        let dom = PageDom::parse(r#"<div><span id="t">x</span></div>"#).unwrap();
        let mut agent = recording_agent();
        agent.apply(Transition::ArmAssertion(AssertionKind::BackgroundColor));
        let target = dom.element_by_id("t").unwrap();
        let CaptureOutcome::Recorded(action) =
            agent.handle_event(&dom, &PageEvent::Click { target }).unwrap()
        else {
            panic!("expected a recorded action");
        };
        assert_eq!(
            action.description,
            r#"Assert background color is "rgba(0, 0, 0, 0)""#
        );
        assert!(action.inherited_from.is_none());
    }

    #[test]
    fn text_and_color_assertions_disarm() {
        let dom = PageDom::parse(
            r#"<h1 id="h" style="color: rgb(1, 2, 3)">  Welcome back  </h1>"#,
        )
        .unwrap();
        let target = dom.element_by_id("h").unwrap();
        let mut agent = recording_agent();

        agent.apply(Transition::ArmAssertion(AssertionKind::Text));
        let CaptureOutcome::Recorded(text) =
            agent.handle_event(&dom, &PageEvent::Click { target }).unwrap()
        else {
            panic!("expected a recorded action");
        };
        assert_eq!(text.value.as_deref(), Some("Welcome back"));
        assert_eq!(text.description, r#"Assert text "Welcome back" exists"#);

        agent.apply(Transition::ArmAssertion(AssertionKind::Color));
        let CaptureOutcome::Recorded(color) =
            agent.handle_event(&dom, &PageEvent::Click { target }).unwrap()
        else {
            panic!("expected a recorded action");
        };
        assert_eq!(color.value.as_deref(), Some("rgb(1, 2, 3)"));
        assert_eq!(agent.state(), RecorderState::Recording);
    }

    #[test]
    fn change_events() {
        let dom = PageDom::parse(
            r#"<input id="n" placeholder="Your name">
               <textarea id="bio"></textarea>
               <select id="c"><option value="fr">France</option><option value="de">Germany</option></select>
               <div id="e" contenteditable="true"></div>"#,
        )
        .unwrap();
        let mut agent = recording_agent();
        let change = |id: &str, value: &str| PageEvent::Change {
            target: dom.element_by_id(id).unwrap(),
            value: value.to_string(),
        };

        let outcomes: Vec<_> = [
            change("n", "Ada"),
            change("bio", "hi"),
            change("c", "de"),
            change("e", "<b>x</b>"),
        ]
        .iter()
        .map(|event| agent.handle_event(&dom, event).unwrap())
        .collect();

        let descriptions: Vec<_> = outcomes
            .into_iter()
            .map(|outcome| match outcome {
                CaptureOutcome::Recorded(action) => action.description,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            descriptions,
            vec![
                r#"Type "Ada" into Your name"#,
                r#"Type "hi" into textarea"#,
                r#"Select "Germany" from dropdown"#,
                r#"Type "<b>x</b>" into contenteditable div"#,
            ]
        );
    }

    #[test]
    fn changes_ignored_while_armed() {
        let dom = PageDom::parse(r#"<input id="n">"#).unwrap();
        let mut agent = recording_agent();
        agent.apply(Transition::ArmAssertion(AssertionKind::Visible));
        let event = PageEvent::Change {
            target: dom.element_by_id("n").unwrap(),
            value: "x".into(),
        };
        assert_eq!(agent.handle_event(&dom, &event).unwrap(), CaptureOutcome::Ignored);
    }

    #[test]
    fn hover_highlight_follows_state() {
        let dom = PageDom::parse(r#"<p id="p">x</p>"#).unwrap();
        let target = dom.element_by_id("p").unwrap();
        let mut agent = recording_agent();
        assert_eq!(
            agent.handle_event(&dom, &PageEvent::MouseOver { target }).unwrap(),
            CaptureOutcome::Highlight(Highlight::Add {
                node: target,
                class: "recorder-hover".into()
            })
        );
        agent.apply(Transition::ArmAssertion(AssertionKind::BackgroundColor));
        assert_eq!(
            agent.handle_event(&dom, &PageEvent::MouseOver { target }).unwrap(),
            CaptureOutcome::Highlight(Highlight::Add {
                node: target,
                class: "recorder-assertion-background-color".into()
            })
        );
        assert_eq!(
            agent.handle_event(&dom, &PageEvent::MouseOut { target }).unwrap(),
            CaptureOutcome::Highlight(Highlight::Clear { node: target })
        );
    }

    #[test]
    fn clicking_a_text_node_is_blocked() {
        let dom = PageDom::parse("<p>text</p>").unwrap();
        let p = node(&dom, "//p");
        let text = dom.children(p)[0];
        let mut agent = recording_agent();
        assert_eq!(
            agent
                .handle_event(&dom, &PageEvent::Click { target: text })
                .unwrap(),
            CaptureOutcome::Blocked {
                alert: NO_LOCATOR_ALERT.to_string()
            }
        );
        assert!(matches!(
            agent.handle_event(&dom, &PageEvent::Click { target: 10_000 }),
            Err(CaptureError::UnknownNode(10_000))
        ));
    }

    #[test]
    fn scripted_events_resolve_by_locator() {
        let dom = PageDom::parse(r#"<button id="go">Go</button>"#).unwrap();
        let scripted: ScriptedEvent =
            serde_json::from_str(r#"{"event":"click","target":"//*[@id=\"go\"]"}"#).unwrap();
        assert_eq!(
            scripted.resolve(&dom).unwrap(),
            PageEvent::Click {
                target: dom.element_by_id("go").unwrap()
            }
        );
        let missing = ScriptedEvent::Click {
            target: "//nav".into(),
        };
        assert!(matches!(
            missing.resolve(&dom),
            Err(CaptureError::TargetNotFound(_))
        ));
    }
}
