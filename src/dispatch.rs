use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CallError;
use crate::message::Message;
use crate::tool::ToolRegistry;
use crate::validate::Action;

/// Outcome of one iteration, reported back to the model as a user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Feedback {
    #[serde(rename = "feedback_error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        function: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<Map<String, Value>>,
        error: Value,
    },
    #[serde(rename = "feedback_success")]
    Success {
        function: String,
        arguments: Map<String, Value>,
        result: Value,
    },
}

impl Feedback {
    /// The payload could not be decoded or had the wrong shape.
    pub fn malformed(err: &CallError) -> Self {
        Feedback::Error {
            function: None,
            arguments: None,
            error: err.to_payload(),
        }
    }

    pub fn call_failed(action: &Action, err: &CallError) -> Self {
        Feedback::Error {
            function: Some(action.function.clone()),
            arguments: Some(action.arguments.clone()),
            error: err.to_payload(),
        }
    }

    pub fn succeeded(action: &Action, result: Value) -> Self {
        Feedback::Success {
            function: action.function.clone(),
            arguments: action.arguments.clone(),
            result,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Feedback::Error { .. })
    }

    pub fn to_message(&self) -> Message {
        Message::user(serde_json::to_string(self).unwrap_or_default())
    }
}

/// Runs an already validated action. Tools are not retried.
pub async fn execute(registry: &ToolRegistry, action: &Action) -> Result<Value, CallError> {
    registry
        .invoke(&action.function, Value::Object(action.arguments.clone()))
        .await
}
