use async_trait::async_trait;

use crate::dispatch::Feedback;
use crate::error::Result;
use crate::message::Message;

/// Observer of the agent loop. An error returned from any method ends the turn.
#[async_trait]
pub trait AgentHook: Send + Sync {
    async fn before_model(&self, _messages: &[Message]) -> Result<()> {
        Ok(())
    }

    async fn after_model(&self, _response: &Message) -> Result<()> {
        Ok(())
    }

    async fn on_feedback(&self, _feedback: &Feedback) -> Result<()> {
        Ok(())
    }
}
