//! Shell command tool.
//!
//! Runs a command through `sh -c` with a blocklist and a timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::error::Result;
use crate::schema::{ToolSchema, TypeSpec};
use crate::tool::Tool;

use super::{invocation_error, required_str};

const NAME: &str = "run_shell_command";

#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Working directory for every command.
    pub base_dir: Option<PathBuf>,
    /// Only the last `max_output_lines` lines of output are returned.
    pub max_output_lines: usize,
    pub timeout_secs: u64,
    /// Substrings that make a command refuse to run.
    pub blocked_commands: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            max_output_lines: 100,
            timeout_secs: 30,
            blocked_commands: vec![
                "rm -rf /".into(),
                "mkfs".into(),
                "dd if=".into(),
                ":(){:|:&};:".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunShellCommand {
    config: ShellConfig,
}

impl RunShellCommand {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    fn blocked_by(&self, command: &str) -> Option<&str> {
        self.config
            .blocked_commands
            .iter()
            .map(String::as_str)
            .find(|blocked| command.contains(blocked))
    }

    fn tail(&self, output: &str) -> String {
        let lines: Vec<&str> = output.lines().collect();
        if lines.len() > self.config.max_output_lines {
            lines[lines.len() - self.config.max_output_lines..].join("\n")
        } else {
            output.to_string()
        }
    }
}

#[async_trait]
impl Tool for RunShellCommand {
    fn schema(&self) -> Result<ToolSchema> {
        ToolSchema::builder(NAME)
            .description("Running a shell command")
            .param::<str>("command")
            .returns(TypeSpec::of::<str>())
            .build()
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let command = required_str(&arguments, "command", NAME)?;
        if let Some(blocked) = self.blocked_by(command) {
            return Err(invocation_error(
                NAME,
                format!("command blocked for safety: contains `{blocked}`"),
            ));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.base_dir {
            cmd.current_dir(dir);
        }

        let output = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), cmd.output())
            .await
            .map_err(|_| invocation_error(NAME, "command timed out"))?
            .map_err(|err| invocation_error(NAME, err))?;

        // stderr is interleaved after stdout, the way a terminal would show it
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = self.tail(&combined);

        if output.status.success() {
            Ok(json!(combined))
        } else {
            let code = output.status.code().unwrap_or(-1);
            Err(invocation_error(
                NAME,
                format!("command exited with status {code}: {combined}"),
            ))
        }
    }
}
