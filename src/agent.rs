use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::AppConfig;
use crate::dispatch::{self, Feedback};
use crate::error::Result;
use crate::hooks::AgentHook;
use crate::llm::{LanguageModel, ModelOptions};
use crate::memory::ConversationMemory;
use crate::message::Message;
use crate::prompt::{PromptTemplate, ResponseFormat};
use crate::tool::ToolRegistry;
use crate::validate::{validate_call, validate_shape};

/// An agent that drives a model through thought/action rounds until it calls
/// `finish_conversation` or runs out of iterations.
pub struct Agent<M: LanguageModel> {
    model: Arc<M>,
    model_id: String,
    options: ModelOptions,
    tools: ToolRegistry,
    prompt: PromptTemplate,
    memory: ConversationMemory,
    max_iterations: usize,
    hooks: Vec<Arc<dyn AgentHook>>,
}

impl<M: LanguageModel> Agent<M> {
    pub fn new(model: Arc<M>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
            options: ModelOptions::default(),
            tools: ToolRegistry::new(),
            prompt: PromptTemplate::default(),
            memory: ConversationMemory::default(),
            max_iterations: 10,
            hooks: Vec::new(),
        }
    }

    pub fn from_config(model: Arc<M>, config: &AppConfig) -> Self {
        let mut agent = Self::new(model, config.model.model.clone())
            .with_options(config.model.options.clone())
            .with_max_iterations(config.agent.max_iterations);
        if let Some(prompt) = &config.agent.system_prompt {
            agent = agent.with_system_prompt(prompt.clone());
        }
        if let Some(template) = &config.agent.system_message_template {
            agent = agent.with_system_message_template(template.clone());
        }
        agent
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = self.prompt.with_system_prompt(prompt);
        self
    }

    pub fn with_system_message_template(mut self, template: impl Into<String>) -> Self {
        self.prompt = self.prompt.with_template(template);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Seeds the conversation with earlier messages.
    pub fn with_history(mut self, memory: ConversationMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Caps model calls per turn. Zero is raised to one, so every turn makes
    /// at least one model call.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AgentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn history(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn is_finished(&self) -> bool {
        self.tools.is_finished()
    }

    pub fn response_format(&self) -> ResponseFormat {
        ResponseFormat::for_registry(&self.tools)
    }

    pub fn system_message(&self) -> Message {
        self.prompt.render(&self.tools, &self.response_format())
    }

    /// Runs one user turn.
    ///
    /// Returns the final answer when the model finishes, or `None` when the
    /// iteration budget runs out first. Malformed output and failed tool calls
    /// are fed back to the model; only transport and hook failures surface as
    /// errors.
    pub async fn respond(&mut self, user_input: impl Into<String>) -> Result<Option<Value>> {
        self.tools.terminal_flag().reset();
        self.memory.push(Message::user(user_input));
        let format = self.response_format();
        let system = self.prompt.render(&self.tools, &format);
        info!(model = %self.model_id, max_iterations = self.max_iterations, "starting turn");

        for iteration in 1..=self.max_iterations {
            let mut request = Vec::with_capacity(self.memory.len() + 1);
            request.push(system.clone());
            request.extend(self.memory.iter().cloned());
            for hook in &self.hooks {
                hook.before_model(&request).await?;
            }
            let reply = self
                .model
                .complete(&self.model_id, &request, &self.options)
                .await?;
            for hook in &self.hooks {
                hook.after_model(&reply).await?;
            }
            debug!(iteration, content = %reply.content, "model replied");
            let content = reply.content.clone();
            self.memory.push(reply);

            let decoded = codec::decode(&content, &format)
                .and_then(|payload| validate_shape(&payload, &format));
            let action = match decoded {
                Ok(response) => response.action,
                Err(err) => {
                    warn!(iteration, code = err.code(), error = %err, "malformed model response");
                    self.push_feedback(Feedback::malformed(&err)).await?;
                    continue;
                }
            };

            let outcome = match validate_call(&self.tools, &action.function, &action.arguments) {
                Ok(()) => dispatch::execute(&self.tools, &action).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(result) => {
                    info!(iteration, function = %action.function, "tool call succeeded");
                    self.push_feedback(Feedback::succeeded(&action, result.clone()))
                        .await?;
                    if self.tools.is_finished() {
                        info!(iteration, "turn finished");
                        return Ok(Some(result));
                    }
                }
                Err(err) => {
                    warn!(iteration, function = %action.function, code = err.code(), error = %err, "tool call rejected");
                    self.push_feedback(Feedback::call_failed(&action, &err))
                        .await?;
                }
            }
        }

        self.tools.terminal_flag().reset();
        info!(model = %self.model_id, "iteration budget exhausted");
        Ok(None)
    }

    async fn push_feedback(&mut self, feedback: Feedback) -> Result<()> {
        for hook in &self.hooks {
            hook.on_feedback(&feedback).await?;
        }
        self.memory.push(feedback.to_message());
        Ok(())
    }
}
