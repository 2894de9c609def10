//! Shape checks for decoded payloads and presence checks for tool calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CallError;
use crate::prompt::ResponseFormat;
use crate::tool::ToolRegistry;

/// A decoded model turn: the reasoning plus the single action it picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub thought: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub function: String,
    pub arguments: Map<String, Value>,
}

/// Checks the decoded document against the response format.
///
/// Every violation is collected before failing, so the model learns about
/// all of its mistakes at once.
pub fn validate_shape(payload: &Value, format: &ResponseFormat) -> Result<AgentResponse, CallError> {
    let empty = Map::new();
    let mut details = Vec::new();
    let object = match payload.as_object() {
        Some(object) => object,
        None => {
            details.push("payload is not a JSON object".to_string());
            &empty
        }
    };

    let thought = match object.get("thought") {
        None => {
            details.push("`thought` is missing".to_string());
            None
        }
        Some(Value::String(thought)) => Some(thought.clone()),
        Some(_) => {
            details.push("`thought` is not a string".to_string());
            None
        }
    };

    let mut function = None;
    let mut arguments = None;
    match object.get("action") {
        None => details.push("`action` is missing".to_string()),
        Some(Value::Object(action)) => {
            match action.get("function") {
                None => details.push("`function` is missing from `action`".to_string()),
                Some(Value::String(name)) => function = Some(name.clone()),
                Some(_) => details.push("`function` is not a string".to_string()),
            }
            match action.get("arguments") {
                None => details.push("`arguments` is missing from `action`".to_string()),
                Some(Value::Object(args)) => arguments = Some(args.clone()),
                Some(_) => details.push("`arguments` is not an object".to_string()),
            }
        }
        Some(_) => details.push("`action` is not an object".to_string()),
    }

    match (thought, function, arguments) {
        (Some(thought), Some(function), Some(arguments)) if details.is_empty() => Ok(AgentResponse {
            thought,
            action: Action {
                function,
                arguments,
            },
        }),
        _ => Err(CallError::MalformedPayload {
            error_message: "Some information is missing from the payload".into(),
            error_details: details,
            valid_format: format.to_json(),
        }),
    }
}

/// Checks that `function` exists and that `arguments` matches its schema by
/// name. Values are not type-checked.
pub fn validate_call(
    registry: &ToolRegistry,
    function: &str,
    arguments: &Map<String, Value>,
) -> Result<(), CallError> {
    let schema = registry
        .schema(function)
        .ok_or_else(|| CallError::InvalidFunctionName {
            function: function.to_string(),
            valid_function_names: registry.names().into_iter().map(String::from).collect(),
        })?;

    let missing_arguments: Vec<String> = schema
        .required_arguments()
        .filter(|name| !arguments.contains_key(*name))
        .map(String::from)
        .collect();
    let invalid_arguments: Vec<String> = arguments
        .keys()
        .filter(|key| schema.argument(key).is_none())
        .cloned()
        .collect();

    if missing_arguments.is_empty() && invalid_arguments.is_empty() {
        Ok(())
    } else {
        Err(CallError::InvalidArguments {
            missing_arguments,
            invalid_arguments,
            schema: schema.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::schema::{ToolSchema, TypeSpec};
    use crate::tool::{tool_fn, FINISH_TOOL};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let square = tool_fn(
            ToolSchema::builder("square")
                .param::<f64>("x")
                .optional("precision", TypeSpec::of::<u32>(), 2)
                .build()
                .unwrap(),
            |args: Value| async move { Result::Ok(args) },
        );
        ToolRegistry::new().with_tool(square).unwrap()
    }

    fn format() -> ResponseFormat {
        ResponseFormat::for_registry(&registry())
    }

    fn details(err: CallError) -> Vec<String> {
        match err {
            CallError::MalformedPayload { error_details, .. } => error_details,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn accepts_well_formed_payload() {
        let payload = json!({
            "thought": "square it",
            "action": {"function": "square", "arguments": {"x": 3}}
        });
        let response = validate_shape(&payload, &format()).unwrap();
        assert_eq!(response.action.function, "square");
        assert_eq!(response.action.arguments["x"], json!(3));

        // Validating the same payload again is harmless.
        assert_eq!(validate_shape(&payload, &format()).unwrap(), response);
    }

    #[test]
    fn collects_every_violation() {
        let payload = json!({"thought": 7, "action": {"function": 1, "arguments": []}});
        assert_eq!(
            details(validate_shape(&payload, &format()).unwrap_err()),
            vec![
                "`thought` is not a string",
                "`function` is not a string",
                "`arguments` is not an object",
            ]
        );

        let payload = json!({});
        assert_eq!(
            details(validate_shape(&payload, &format()).unwrap_err()),
            vec!["`thought` is missing", "`action` is missing"]
        );

        let payload = json!({"thought": "t", "action": {}});
        assert_eq!(
            details(validate_shape(&payload, &format()).unwrap_err()),
            vec![
                "`function` is missing from `action`",
                "`arguments` is missing from `action`",
            ]
        );
    }

    #[test]
    fn rejects_non_object_payloads() {
        let found = details(validate_shape(&json!([1, 2]), &format()).unwrap_err());
        assert_eq!(found[0], "payload is not a JSON object");
        assert_eq!(found.len(), 3);

        let found = details(validate_shape(&json!({"thought": "t", "action": "go"}), &format()).unwrap_err());
        assert_eq!(found, vec!["`action` is not an object"]);
    }

    #[test]
    fn unknown_function_lists_every_name() {
        let err = validate_call(&registry(), "unknown_tool", &Map::new()).unwrap_err();
        assert_eq!(
            err,
            CallError::InvalidFunctionName {
                function: "unknown_tool".into(),
                valid_function_names: vec![FINISH_TOOL.to_string(), "square".to_string()],
            }
        );
    }

    #[test]
    fn missing_required_argument_is_reported_alone() {
        let err = validate_call(&registry(), "square", &Map::new()).unwrap_err();
        match err {
            CallError::InvalidArguments {
                missing_arguments,
                invalid_arguments,
                schema,
            } => {
                assert_eq!(missing_arguments, vec!["x"]);
                assert!(invalid_arguments.is_empty());
                assert_eq!(schema.name(), "square");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unexpected_arguments_are_reported() {
        let args = json!({"x": 2, "y": 3, "z": 4});
        let err = validate_call(&registry(), "square", args.as_object().unwrap()).unwrap_err();
        let payload = err.to_payload();
        assert_eq!(payload["code"], "INVALID ARGUMENTS");
        assert_eq!(payload["missing_arguments"], json!([]));
        assert_eq!(payload["invalid_arguments"], json!(["y", "z"]));
        assert_eq!(payload["reminder"]["valid_function_schema"]["name"], "square");
    }

    #[test]
    fn optional_arguments_may_be_omitted() {
        let args = json!({"x": 2});
        assert!(validate_call(&registry(), "square", args.as_object().unwrap()).is_ok());
        let args = json!({"x": 2, "precision": 4});
        assert!(validate_call(&registry(), "square", args.as_object().unwrap()).is_ok());
    }

    #[test]
    fn reports_arguments_in_the_order_the_model_sent_them() {
        let payload: Value = serde_json::from_str(
            r#"{"thought": "t", "action": {"function": "square", "arguments": {"zeta": 1, "x": 2, "alpha": 3}}}"#,
        )
        .unwrap();
        let action = validate_shape(&payload, &format()).unwrap().action;
        let keys: Vec<&str> = action.arguments.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "x", "alpha"]);

        match validate_call(&registry(), "square", &action.arguments).unwrap_err() {
            CallError::InvalidArguments {
                invalid_arguments, ..
            } => assert_eq!(invalid_arguments, vec!["zeta", "alpha"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
