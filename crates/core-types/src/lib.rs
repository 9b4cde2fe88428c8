//! Shared primitives for Recorder Studio: the recorded action model and the control
//! messages exchanged between the panel, the coordinator and the capture agent.

pub mod action;
pub mod message;

pub use action::{plural_seconds, Action, ActionError, ActionKind, AssertionKind};
pub use message::ControlMessage;
