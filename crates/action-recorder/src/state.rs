use serde::{Deserialize, Serialize};

use recorder_core_types::{AssertionKind, ControlMessage};

/// Recording flags as a closed state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "assertion", rename_all = "snake_case")]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
    Armed(AssertionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    SetRecording(bool),
    ArmAssertion(AssertionKind),
    /// An assertion was captured.
    Disarm,
    Reset,
}

impl Transition {
    /// Control messages that affect the recorder; `ActionRecorded` does not.
    pub fn from_message(message: &ControlMessage) -> Option<Self> {
        match message {
            ControlMessage::SetRecording { is_recording } => {
                Some(Transition::SetRecording(*is_recording))
            }
            ControlMessage::ArmAssertion { kind } => Some(Transition::ArmAssertion(*kind)),
            ControlMessage::ActionRecorded { .. } => None,
        }
    }
}

impl RecorderState {
    pub fn next(self, transition: Transition) -> Self {
        match (self, transition) {
            (_, Transition::Reset) => RecorderState::Idle,
            (_, Transition::SetRecording(true)) => RecorderState::Recording,
            (_, Transition::SetRecording(false)) => RecorderState::Idle,
            (RecorderState::Idle, Transition::ArmAssertion(_)) => RecorderState::Idle,
            (_, Transition::ArmAssertion(kind)) => RecorderState::Armed(kind),
            (RecorderState::Armed(_), Transition::Disarm) => RecorderState::Recording,
            (state, Transition::Disarm) => state,
        }
    }

    /// Clicks and hovers are observed outside `Idle`.
    pub fn is_active(&self) -> bool {
        !matches!(self, RecorderState::Idle)
    }

    /// Change events are only recorded while recording and not armed.
    pub fn records_changes(&self) -> bool {
        matches!(self, RecorderState::Recording)
    }

    pub fn armed(&self) -> Option<AssertionKind> {
        match self {
            RecorderState::Armed(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            RecorderState::Idle => "idle".to_string(),
            RecorderState::Recording => "recording".to_string(),
            RecorderState::Armed(kind) => format!("armed:{kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arming_requires_recording() {
        let idle = RecorderState::Idle;
        assert_eq!(
            idle.next(Transition::ArmAssertion(AssertionKind::Text)),
            RecorderState::Idle
        );
        let armed = idle
            .next(Transition::SetRecording(true))
            .next(Transition::ArmAssertion(AssertionKind::Color));
        assert_eq!(armed, RecorderState::Armed(AssertionKind::Color));
        assert_eq!(armed.next(Transition::Disarm), RecorderState::Recording);
    }

    #[test]
    fn toggling_clears_armed_assertion() {
        let armed = RecorderState::Armed(AssertionKind::Visible);
        assert_eq!(
            armed.next(Transition::SetRecording(true)),
            RecorderState::Recording
        );
        assert_eq!(armed.next(Transition::SetRecording(false)), RecorderState::Idle);
        assert_eq!(armed.next(Transition::Reset), RecorderState::Idle);
    }

    #[test]
    fn rearming_replaces_kind() {
        let armed = RecorderState::Armed(AssertionKind::Text)
            .next(Transition::ArmAssertion(AssertionKind::BackgroundColor));
        assert_eq!(armed.armed(), Some(AssertionKind::BackgroundColor));
        assert!(!armed.records_changes());
        assert!(armed.is_active());
    }

    #[test]
    fn messages_map_to_transitions() {
        let msg = ControlMessage::SetRecording { is_recording: true };
        assert_eq!(
            Transition::from_message(&msg),
            Some(Transition::SetRecording(true))
        );
    }
}
