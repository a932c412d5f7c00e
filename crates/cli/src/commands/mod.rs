pub mod actions;
pub mod config;
pub mod context;
pub mod invoke;
pub mod session;

use ledgerpilot_core::errors::ActionError;
use serde::Serialize;
use serde_json::Value;

/// Exit code for an action the dispatcher refused or failed.
pub const ACTION_FAILURE_EXIT: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>, data: Value) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Failure carrying the agent-facing error taxonomy.
    pub fn action_failure(command: &str, error: &ActionError) -> Self {
        let payload = error.payload();
        let data = payload.field.map(|field| serde_json::json!({ "field": field }));
        let outcome = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(payload.kind.as_str().to_string()),
            message: payload.message,
            data,
        };
        Self { exit_code: ACTION_FAILURE_EXIT, output: serialize_payload(outcome) }
    }
}

pub(crate) fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\
             \"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
