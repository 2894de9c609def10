//! Demo tools for the weather agent.
//!
//! - `calculate`: arithmetic on numbers and `+ - * /`
//! - `run_shell_command`: `sh -c` with a blocklist and timeout
//! - `get_current_location`: coordinates from ip-api.com
//! - `get_current_weather`: current conditions from open-meteo

pub mod calculator;
pub mod location;
pub mod shell;
pub mod weather;

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::tool::ToolRegistry;

pub use calculator::Calculate;
pub use location::CurrentLocation;
pub use shell::{RunShellCommand, ShellConfig};
pub use weather::CurrentWeather;

/// A registry holding the four demo tools after the completion tool.
pub fn demo_toolkit(http_timeout_secs: u64, shell: ShellConfig) -> Result<ToolRegistry> {
    ToolRegistry::new()
        .with_tool(CurrentLocation::new(http_timeout_secs)?)?
        .with_tool(CurrentWeather::new(http_timeout_secs)?)?
        .with_tool(Calculate)?
        .with_tool(RunShellCommand::new(shell))
}

pub(crate) fn invocation_error(
    name: &str,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> AgentError {
    AgentError::ToolInvocation {
        name: name.to_string(),
        source: source.into(),
    }
}

pub(crate) fn required_str<'a>(arguments: &'a Value, field: &str, tool: &str) -> Result<&'a str> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| invocation_error(tool, format!("`{field}` must be a string")))
}

pub(crate) fn required_f64(arguments: &Value, field: &str, tool: &str) -> Result<f64> {
    arguments
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| invocation_error(tool, format!("`{field}` must be a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::FINISH_TOOL;

    #[test]
    fn demo_toolkit_keeps_registration_order() {
        let registry = demo_toolkit(5, ShellConfig::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                FINISH_TOOL,
                "get_current_location",
                "get_current_weather",
                "calculate",
                "run_shell_command",
            ]
        );
    }
}
