//! Model transports.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ModelConfig;
use crate::error::{AgentError, Result};
use crate::message::{Message, Role};

/// Provider options forwarded verbatim with every completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Any other provider-specific body fields.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Synchronous request/response contract with a chat model.
///
/// Implementations must not retry; a failed call ends the turn.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        options: &ModelOptions,
    ) -> Result<Message>;
}

fn coalesce_error(status: reqwest::StatusCode, body: &str, provider: &str) -> AgentError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return AgentError::LanguageModel(format!("{provider} rate limit exceeded: {body}"));
    }
    AgentError::LanguageModel(format!("{provider} request failed with {status}: {body}"))
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    organization: Option<String>,
}

impl OpenAIClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::build(Some(api_key.into()), Self::DEFAULT_BASE_URL.into(), None, 60)
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());
        if cfg.api_key.is_none() && base_url == Self::DEFAULT_BASE_URL {
            return Err(AgentError::LanguageModel(
                "missing OpenAI API key in model config".into(),
            ));
        }
        Self::build(
            cfg.api_key.clone(),
            base_url,
            cfg.organization.clone(),
            cfg.timeout_secs,
        )
    }

    fn build(
        api_key: Option<String>,
        base_url: String,
        organization: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .map_err(|err| AgentError::LanguageModel(format!("http client error: {err}")))?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            organization,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(model: &str, messages: &[Message], options: &ModelOptions) -> Value {
        let mut body = Map::new();
        if let Value::Object(extra) = serde_json::to_value(options).unwrap_or_default() {
            body.extend(extra);
        }
        body.insert("model".into(), Value::String(model.to_string()));
        body.insert(
            "messages".into(),
            serde_json::to_value(messages).unwrap_or_default(),
        );
        body.insert("stream".into(), Value::Bool(false));
        Value::Object(body)
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        options: &ModelOptions,
    ) -> Result<Message> {
        let payload = Self::request_body(model, messages, options);

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"));
        }
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }
        let resp = builder
            .json(&payload)
            .send()
            .await
            .map_err(|err| AgentError::LanguageModel(format!("OpenAI request error: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(coalesce_error(status, &body, "openai"));
        }

        let body: OpenAiResponse = resp.json().await.map_err(|err| {
            AgentError::LanguageModel(format!("OpenAI response parse error: {err}"))
        })?;

        let first = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::LanguageModel("OpenAI returned no choices".into()))?;

        Ok(Message::new(
            first.message.role.unwrap_or(Role::Assistant),
            first.message.content.unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    role: Option<Role>,
    content: Option<String>,
}

/// A deterministic model used for tests and demos.
///
/// Replies are handed out in order; every request is recorded.
pub struct StubModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl StubModel {
    pub fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(
        &self,
        _model: &str,
        messages: &[Message],
        _options: &ModelOptions,
    ) -> Result<Message> {
        self.requests
            .lock()
            .map_err(|_| AgentError::LanguageModel("stub model poisoned".into()))?
            .push(messages.to_vec());
        let raw = self
            .responses
            .lock()
            .map_err(|_| AgentError::LanguageModel("stub model poisoned".into()))?
            .pop_front()
            .ok_or_else(|| {
                AgentError::LanguageModel("StubModel ran out of scripted responses".into())
            })?;
        Ok(Message::assistant(raw))
    }
}
