//! Asks every configured model the same weather question.
//!
//! Usage: `weather-agent [model ...]`. Without arguments the model from the
//! configuration is used. `TOOL_AGENT_CONFIG` points at an optional TOML file;
//! `TOOL_AGENT_*` variables override it.

use std::env;
use std::sync::Arc;

use tool_agent::telemetry::init_tracing;
use tool_agent::tools::{demo_toolkit, ShellConfig};
use tool_agent::{Agent, AppConfig, OpenAIClient, Result};

const QUESTION: &str = "What's the current weather for my location? Give me the temperature in degrees Celsius and the wind speed in knots.";

#[tokio::main]
async fn main() -> Result<()> {
    let config = match env::var("TOOL_AGENT_CONFIG") {
        Ok(path) => AppConfig::from_env_or_file(path)?,
        Err(_) => AppConfig::from_env()?,
    };
    init_tracing(&config.logging);

    let mut models: Vec<String> = env::args().skip(1).collect();
    if models.is_empty() {
        models.push(config.model.model.clone());
    }

    for model in models {
        println!();
        println!("--- {model}");
        if let Err(err) = ask(&config, &model).await {
            tracing::error!(%model, error = %err, "agent failed");
            println!("--- {model} failed: {err}");
        }
    }
    Ok(())
}

async fn ask(config: &AppConfig, model: &str) -> Result<()> {
    let mut config = config.clone();
    config.model.model = model.to_string();

    let client = OpenAIClient::from_config(&config.model)?;
    let tools = demo_toolkit(config.model.timeout_secs, ShellConfig::default())?;
    let mut agent = Agent::from_config(Arc::new(client), &config).with_tools(tools);

    let answer = agent.respond(QUESTION).await?;

    for message in agent.history().iter() {
        println!("[{:?}] {}", message.role, message.content);
    }
    println!("--- {model} final answer");
    match answer {
        Some(answer) => println!("{}", serde_json::to_string_pretty(&answer)?),
        None => println!("(no answer within {} iterations)", agent.max_iterations()),
    }
    Ok(())
}
