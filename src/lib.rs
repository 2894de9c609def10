//! A tool-calling agent loop.
//!
//! The crate turns a chat model's free-text completions into validated tool
//! calls:
//! - Tools describe themselves with a [`ToolSchema`] and live in a [`ToolRegistry`].
//! - Each model reply is decoded, checked against the registry and dispatched.
//! - Results and errors go back to the model as JSON feedback until it calls
//!   `finish_conversation` or the iteration budget runs out.

mod agent;
pub mod codec;
pub mod config;
pub mod dispatch;
mod error;
mod hooks;
mod llm;
mod memory;
mod message;
pub mod prompt;
pub mod schema;
pub mod telemetry;
mod tool;
pub mod tools;
pub mod validate;

pub use agent::Agent;
pub use config::{AgentConfig, AppConfig, LoggingConfig, ModelConfig};
pub use dispatch::Feedback;
pub use error::{AgentError, CallError, Result};
pub use hooks::AgentHook;
pub use llm::{LanguageModel, ModelOptions, OpenAIClient, StubModel};
pub use memory::ConversationMemory;
pub use message::{Message, Role};
pub use prompt::{PromptTemplate, ResponseFormat};
pub use schema::{ArgumentSpec, Describe, ToolSchema, ToolSchemaBuilder, TypeSpec};
pub use tool::{tool_fn, FnTool, TerminalFlag, Tool, ToolRegistry, FINISH_TOOL};
pub use validate::{Action, AgentResponse};
