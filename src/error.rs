use serde_json::{json, Value};
use thiserror::Error;

use crate::schema::ToolSchema;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Failures that end a turn or prevent an agent from being built.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),

    #[error("invalid tool schema: {0}")]
    InvalidSchema(String),

    #[error("tool `{name}` invocation failed: {source}")]
    ToolInvocation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Recoverable failures of a single iteration.
///
/// None of these leave the agent loop: each one is rendered with
/// [`CallError::to_payload`] and handed back to the model as feedback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("{error_message}")]
    MalformedPayload {
        error_message: String,
        error_details: Vec<String>,
        valid_format: Value,
    },

    #[error("{function} is not a valid function")]
    InvalidFunctionName {
        function: String,
        valid_function_names: Vec<String>,
    },

    #[error("arguments don't adhere to the function schema")]
    InvalidArguments {
        missing_arguments: Vec<String>,
        invalid_arguments: Vec<String>,
        schema: ToolSchema,
    },

    #[error("failed to execute function: {message}")]
    ExecutionFailed { message: String, schema: ToolSchema },
}

impl CallError {
    pub fn code(&self) -> &'static str {
        match self {
            CallError::MalformedPayload { .. } => "MALFORMED PAYLOAD",
            CallError::InvalidFunctionName { .. } => "INVALID FUNCTION NAME",
            CallError::InvalidArguments { .. } => "INVALID ARGUMENTS",
            CallError::ExecutionFailed { .. } => "EXECUTION FAILED",
        }
    }

    /// Structured form shown to the model, including a reminder of what was expected.
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "code": self.code(),
            "error_message": self.to_string(),
        });
        match self {
            CallError::MalformedPayload {
                error_details,
                valid_format,
                ..
            } => {
                if !error_details.is_empty() {
                    payload["error_details"] = json!(error_details);
                }
                payload["reminder"] = json!({ "valid_format": valid_format });
            }
            CallError::InvalidFunctionName {
                valid_function_names,
                ..
            } => {
                payload["reminder"] = json!({ "valid_function_names": valid_function_names });
            }
            CallError::InvalidArguments {
                missing_arguments,
                invalid_arguments,
                schema,
            } => {
                payload["missing_arguments"] = json!(missing_arguments);
                payload["invalid_arguments"] = json!(invalid_arguments);
                payload["reminder"] = json!({ "valid_function_schema": schema.to_json() });
            }
            CallError::ExecutionFailed { schema, .. } => {
                payload["reminder"] = json!({ "valid_function_schema": schema.to_json() });
            }
        }
        payload
    }
}
