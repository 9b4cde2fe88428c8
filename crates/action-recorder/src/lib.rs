//! Recording state machine and DOM event capture.
//!
//! A [`CaptureAgent`] observes clicks, changes and hovers on a [`action_locator::PageDom`]
//! snapshot and emits recorded actions while the recorder is active.

pub mod capture;
pub mod errors;
pub mod state;
pub mod style;

pub use capture::{
    highlight_class, truncate_text, CaptureAgent, CaptureOutcome, Highlight, PageEvent,
    ScriptedEvent, DESCRIPTION_LIMIT, HOVER_CLASS, NO_LOCATOR_ALERT,
};
pub use errors::CaptureError;
pub use state::{RecorderState, Transition};
pub use style::{is_transparent, InlineStyleSource, StyleSource};
