//! Inbound host commands

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Command invoked by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    ToggleFlashlight { should_turn_on: bool },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleFlashlightArgs {
    should_turn_on: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Method not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },
}

impl HostCommand {
    pub const TOGGLE_FLASHLIGHT: &'static str = "toggleFlashlight";

    /// Parse a method call from the host
    pub fn parse(method: &str, arguments: &Value) -> Result<Self, CommandError> {
        match method {
            Self::TOGGLE_FLASHLIGHT => {
                let args: ToggleFlashlightArgs = serde_json::from_value(arguments.clone())
                    .map_err(|e| CommandError::InvalidArguments {
                        method: method.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(HostCommand::ToggleFlashlight {
                    should_turn_on: args.should_turn_on,
                })
            }
            other => Err(CommandError::NotImplemented(other.to_string())),
        }
    }
}

/// Reply to a host command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CommandResponse {
    Ack,
    NotImplemented { method: String },
    Error { code: String, message: String },
}

impl CommandResponse {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        CommandResponse::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<CommandError> for CommandResponse {
    fn from(error: CommandError) -> Self {
        match error {
            CommandError::NotImplemented(method) => CommandResponse::NotImplemented { method },
            e @ CommandError::InvalidArguments { .. } => {
                CommandResponse::error("invalid_arguments", e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_toggle_flashlight() {
        let command = HostCommand::parse("toggleFlashlight", &json!({ "shouldTurnOn": true })).unwrap();
        assert_eq!(command, HostCommand::ToggleFlashlight { should_turn_on: true });
    }

    #[test]
    fn test_unknown_method() {
        let error = HostCommand::parse("zoomIn", &Value::Null).unwrap_err();
        assert_eq!(error, CommandError::NotImplemented("zoomIn".into()));
        assert_eq!(
            CommandResponse::from(error),
            CommandResponse::NotImplemented { method: "zoomIn".into() }
        );
    }

    #[test]
    fn test_missing_argument() {
        let error = HostCommand::parse("toggleFlashlight", &json!({})).unwrap_err();
        assert!(matches!(error, CommandError::InvalidArguments { .. }));
        assert!(matches!(CommandResponse::from(error), CommandResponse::Error { .. }));
    }

    #[test]
    fn test_response_wire_format() {
        assert_eq!(serde_json::to_value(CommandResponse::Ack).unwrap(), json!({ "status": "ack" }));
        assert_eq!(
            serde_json::to_value(CommandResponse::NotImplemented { method: "x".into() }).unwrap(),
            json!({ "status": "notImplemented", "method": "x" })
        );
    }
}
