//! System-message rendering.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::message::Message;
use crate::tool::ToolRegistry;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Template with `{system_prompt}`, `{response_format}`, `{function_names}`
/// and `{function_schemas}` placeholders.
pub const DEFAULT_SYSTEM_MESSAGE_TEMPLATE: &str = r#"{system_prompt}

You SHOULD ONLY respond with the following JSON format:
```
{response_format}
```
Your goal is to find an accurate `final_answer` based on series of `thought`, `action`, and feedback.
- Your `action` SHOULD contain `function` and `arguments` adhering to the FUNCTION SCHEMA.
- For every `thought` and `action` in your response, the user will give you feedback.
- The feedback might contain:
    - The return value of the function.
    - An error
- In case you find an error, you should fix your response based on the error message.
- You SHOULD ONLY call `finish_conversation` function if:
    - You have the `final_answer`.
    - You think it is impossible to find the `final_answer`.

You SHOULD use the following FUNCTION SCHEMA as reference:
{function_schemas}"#;

/// The JSON skeleton the model is asked to answer with.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    thought: String,
    action: ActionFormat,
}

#[derive(Debug, Clone, Serialize)]
struct ActionFormat {
    function: String,
    arguments: BTreeMap<String, String>,
}

impl ResponseFormat {
    pub fn for_registry(registry: &ToolRegistry) -> Self {
        let names = registry
            .names()
            .iter()
            .map(|name| format!("`{name}`"))
            .collect::<Vec<_>>()
            .join(", ");
        let arguments = BTreeMap::from([
            ("<argument-1>".to_string(), "<value-1>".to_string()),
            ("<argument-2>".to_string(), "<value-2>".to_string()),
        ]);
        Self {
            thought: "<your plan and reasoning to choose an action>".into(),
            action: ActionFormat {
                function: format!("<function name, SHOULD STRICTLY be one of these: {names}>"),
                arguments,
            },
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Caller-overridable prompt text plus the template it is rendered into.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system_prompt: String,
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            template: DEFAULT_SYSTEM_MESSAGE_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn render(&self, registry: &ToolRegistry, format: &ResponseFormat) -> Message {
        let names = serde_json::to_string(&registry.names()).unwrap_or_default();
        let response_format = format.render();
        let schemas = registry.catalogue();
        let content = substitute(
            &self.template,
            &[
                ("{system_prompt}", self.system_prompt.trim()),
                ("{response_format}", &response_format),
                ("{function_names}", &names),
                ("{function_schemas}", &schemas),
            ],
        );
        Message::system(content)
    }
}

/// Replaces placeholders in one pass; substituted text is never rescanned.
fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(idx) = rest.find('{') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
