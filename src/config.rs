use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::llm::ModelOptions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub options: ModelOptions,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            organization: None,
            timeout_secs: default_timeout_secs(),
            options: ModelOptions::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub system_message_template: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt: None,
            system_message_template: None,
        }
    }
}

fn default_max_iterations() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)
            .map_err(|err| AgentError::Config(format!("failed to parse configuration: {err}")))?;
        Ok(cfg)
    }

    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Defaults overlaid with `TOOL_AGENT_*` variables.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies `TOOL_AGENT_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(provider) = lookup("TOOL_AGENT_PROVIDER") {
            self.model.provider = provider;
        }
        if let Some(model) = lookup("TOOL_AGENT_MODEL") {
            self.model.model = model;
        }
        if let Some(key) = lookup("TOOL_AGENT_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup("TOOL_AGENT_BASE_URL") {
            self.model.base_url = Some(url);
        }
        if let Some(org) = lookup("TOOL_AGENT_ORG") {
            self.model.organization = Some(org);
        }
        if let Some(raw) = lookup("TOOL_AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.parse::<usize>().map_err(|err| {
                AgentError::Config(format!("TOOL_AGENT_MAX_ITERATIONS `{raw}`: {err}"))
            })?;
        }
        if let Some(level) = lookup("TOOL_AGENT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("TOOL_AGENT_LOG_JSON") {
            if let Ok(parsed) = json.parse::<bool>() {
                self.logging.json = parsed;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let cfg = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.agent.max_iterations, 10);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn loads_options_table() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[model]\nmodel='mistral-large'\nbase_url='http://localhost:8000/v1'\n[model.options]\ntemperature=0.25\ntop_p=0.9\n[agent]\nmax_iterations=4\nsystem_prompt='Be brief.'"
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(cfg.model.model, "mistral-large");
        assert_eq!(cfg.model.options.temperature, Some(0.25));
        assert_eq!(cfg.model.options.extra["top_p"], serde_json::json!(0.9));
        assert_eq!(cfg.agent.max_iterations, 4);
        assert_eq!(cfg.agent.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn loads_and_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model]\nprovider='openai'\nmodel='gpt-4'\n[logging]\nlevel='warn'").unwrap();
        let vars = HashMap::from([
            ("TOOL_AGENT_MODEL", "gpt-4o-mini"),
            ("TOOL_AGENT_LOG_JSON", "true"),
            ("TOOL_AGENT_MAX_ITERATIONS", "3"),
        ]);

        let mut cfg = AppConfig::from_file(file.path()).unwrap();
        cfg.apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(cfg.model.model, "gpt-4o-mini");
        assert_eq!(cfg.model.provider, "openai");
        assert_eq!(cfg.logging.level, "warn");
        assert!(cfg.logging.json);
        assert_eq!(cfg.agent.max_iterations, 3);
    }

    #[test]
    fn rejects_non_numeric_iteration_override() {
        let mut cfg = AppConfig::default();
        let err = cfg
            .apply_overrides(|key| (key == "TOOL_AGENT_MAX_ITERATIONS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn rejects_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[model\nmodel=").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
