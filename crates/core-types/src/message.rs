use serde::{Deserialize, Serialize};

use crate::action::{Action, AssertionKind};

/// Messages exchanged between the panel, the coordinator and the capture agent.
///
/// The wire names written by the browser extension (`TOGGLE_RECORDING`,
/// `ADD_ASSERTION_MODE`, `ACTION_RECORDED`) are accepted as aliases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    #[serde(alias = "TOGGLE_RECORDING")]
    SetRecording {
        #[serde(rename = "isRecording")]
        is_recording: bool,
    },
    #[serde(alias = "ADD_ASSERTION_MODE")]
    ArmAssertion {
        #[serde(alias = "assertionType")]
        kind: AssertionKind,
    },
    #[serde(alias = "ACTION_RECORDED")]
    ActionRecorded { action: Action },
}

impl ControlMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ControlMessage::SetRecording { .. } => "set_recording",
            ControlMessage::ArmAssertion { .. } => "arm_assertion",
            ControlMessage::ActionRecorded { .. } => "action_recorded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_extension_message_names() {
        let toggle: ControlMessage =
            serde_json::from_value(json!({ "type": "TOGGLE_RECORDING", "isRecording": true }))
                .unwrap();
        assert_eq!(toggle, ControlMessage::SetRecording { is_recording: true });

        let arm: ControlMessage = serde_json::from_value(
            json!({ "type": "ADD_ASSERTION_MODE", "assertionType": "background-color" }),
        )
        .unwrap();
        assert_eq!(
            arm,
            ControlMessage::ArmAssertion {
                kind: AssertionKind::BackgroundColor
            }
        );
    }

    #[test]
    fn encodes_tagged_variants() {
        let value = serde_json::to_value(ControlMessage::ArmAssertion {
            kind: AssertionKind::Text,
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "arm_assertion", "kind": "text" }));
    }
}
