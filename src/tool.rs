use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::{AgentError, CallError, Result};
use crate::schema::{ToolSchema, TypeSpec};

/// Name of the built-in tool that ends a turn.
pub const FINISH_TOOL: &str = "finish_conversation";

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Describes the tool. Called once, when the tool is registered.
    fn schema(&self) -> Result<ToolSchema>;

    /// Runs the tool. `arguments` is always a JSON object whose keys were
    /// checked against the schema beforehand.
    async fn call(&self, arguments: Value) -> Result<Value>;
}

/// A tool backed by an async closure. Created with [`tool_fn`].
pub struct FnTool<F> {
    schema: ToolSchema,
    handler: F,
}

impl<F> std::fmt::Debug for FnTool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.schema.name())
            .finish_non_exhaustive()
    }
}

pub fn tool_fn<F, Fut>(schema: ToolSchema, handler: F) -> FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    FnTool { schema, handler }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn schema(&self) -> Result<ToolSchema> {
        Ok(self.schema.clone())
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }
}

/// Shared flag flipped by [`FinishTool`] when the model delivers its answer.
#[derive(Debug, Clone, Default)]
pub struct TerminalFlag(Arc<AtomicBool>);

impl TerminalFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The completion tool every registry starts with.
pub struct FinishTool {
    finished: TerminalFlag,
}

impl FinishTool {
    fn definition() -> ToolSchema {
        ToolSchema::builder(FINISH_TOOL)
            .description("Ends up conversation with user with final answer")
            .param::<str>("final_answer")
            .returns(TypeSpec::of::<str>())
            .finish()
    }
}

#[async_trait]
impl Tool for FinishTool {
    fn schema(&self) -> Result<ToolSchema> {
        Ok(Self::definition())
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let answer = arguments
            .get("final_answer")
            .cloned()
            .ok_or_else(|| AgentError::Protocol("missing `final_answer`".into()))?;
        self.finished.set();
        Ok(answer)
    }
}

#[derive(Clone)]
struct RegisteredTool {
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

/// The fixed tool set of one agent, keyed by name and kept in registration order.
///
/// The completion tool is always registered first.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    finished: TerminalFlag,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("finished", &self.finished.is_set())
            .finish()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let finished = TerminalFlag::default();
        let finish = FinishTool {
            finished: finished.clone(),
        };
        let mut registry = Self {
            tools: Vec::new(),
            index: HashMap::new(),
            finished,
        };
        registry.insert(FinishTool::definition(), Arc::new(finish));
        registry
    }

    fn insert(&mut self, schema: ToolSchema, tool: Arc<dyn Tool>) {
        self.index.insert(schema.name().to_string(), self.tools.len());
        self.tools.push(RegisteredTool { schema, tool });
    }

    /// Registers a tool, building its schema once.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<&mut Self> {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<&mut Self> {
        let schema = tool.schema()?;
        if self.index.contains_key(schema.name()) {
            return Err(AgentError::DuplicateTool(schema.name().to_string()));
        }
        tracing::debug!(tool = schema.name(), "registered tool");
        self.insert(schema, tool);
        Ok(self)
    }

    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// Names in registration order, the completion tool first.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|entry| entry.schema.name()).collect()
    }

    pub fn schemas_by_name(&self) -> HashMap<&str, &ToolSchema> {
        self.tools
            .iter()
            .map(|entry| (entry.schema.name(), &entry.schema))
            .collect()
    }

    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.index.get(name).map(|&idx| &self.tools[idx].schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn terminal_flag(&self) -> &TerminalFlag {
        &self.finished
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_set()
    }

    /// Calls the named tool. Any failure of the tool itself comes back as
    /// [`CallError::ExecutionFailed`] carrying the tool's schema.
    pub async fn invoke(&self, name: &str, arguments: Value) -> std::result::Result<Value, CallError> {
        let entry = match self.index.get(name) {
            Some(&idx) => &self.tools[idx],
            None => {
                return Err(CallError::InvalidFunctionName {
                    function: name.to_string(),
                    valid_function_names: self.names().into_iter().map(String::from).collect(),
                })
            }
        };
        entry
            .tool
            .call(arguments)
            .await
            .map_err(|err| CallError::ExecutionFailed {
                message: err.to_string(),
                schema: entry.schema.clone(),
            })
    }

    /// Pretty JSON catalogue of every schema, in registration order.
    pub fn catalogue(&self) -> String {
        serde_json::to_string_pretty(&Catalogue(self)).unwrap_or_default()
    }
}

struct Catalogue<'a>(&'a ToolRegistry);

impl Serialize for Catalogue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.tools.len()))?;
        for entry in &self.0.tools {
            map.serialize_entry(entry.schema.name(), &entry.schema)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn schema(&self) -> Result<ToolSchema> {
            ToolSchema::builder("upper")
                .description("Uppercases `text`.")
                .param::<str>("text")
                .returns(TypeSpec::of::<str>())
                .build()
        }

        async fn call(&self, arguments: Value) -> Result<Value> {
            let text = arguments["text"].as_str().unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        }
    }

    fn failing() -> impl Tool {
        tool_fn(
            ToolSchema::builder("explode").build().unwrap(),
            |_args| async { Err(AgentError::Protocol("boom".into())) },
        )
    }

    #[test]
    fn finish_tool_is_always_first() {
        let mut registry = ToolRegistry::new();
        registry.register(Upper).unwrap();

        assert_eq!(registry.names(), vec![FINISH_TOOL, "upper"]);
        let schemas = registry.schemas_by_name();
        let finish = schemas[FINISH_TOOL];
        let args: Vec<(&str, bool)> = finish
            .arguments()
            .map(|(name, spec)| (name, spec.is_required()))
            .collect();
        assert_eq!(args, vec![("final_answer", true)]);
        assert_eq!(
            finish.argument("final_answer").unwrap().type_spec(),
            &TypeSpec::scalar("str")
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Upper).unwrap();
        let err = registry.register(Upper).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "upper"));

        let err = ToolRegistry::new()
            .with_tool(tool_fn(
                ToolSchema::builder(FINISH_TOOL).build().unwrap(),
                |args| async move { Ok(args) },
            ))
            .unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(_)));
    }

    #[tokio::test]
    async fn invoking_finish_sets_the_flag() {
        let registry = ToolRegistry::new();
        assert!(!registry.is_finished());

        let result = registry
            .invoke(FINISH_TOOL, json!({"final_answer": "42"}))
            .await
            .unwrap();

        assert_eq!(result, json!("42"));
        assert!(registry.is_finished());
        registry.terminal_flag().reset();
        assert!(!registry.is_finished());
    }

    #[tokio::test]
    async fn tool_failure_becomes_execution_failed() {
        let registry = ToolRegistry::new().with_tool(failing()).unwrap();

        let err = registry.invoke("explode", json!({})).await.unwrap_err();

        match err {
            CallError::ExecutionFailed { message, schema } => {
                assert!(message.contains("boom"));
                assert_eq!(schema.name(), "explode");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn catalogue_lists_schemas_in_order() {
        let registry = ToolRegistry::new().with_tool(Upper).unwrap();
        let catalogue = registry.catalogue();

        let parsed: Value = serde_json::from_str(&catalogue).unwrap();
        assert_eq!(parsed["upper"]["description"], "Uppercases `text`.");
        assert!(catalogue.find(FINISH_TOOL).unwrap() < catalogue.find("\"upper\"").unwrap());
    }
}
