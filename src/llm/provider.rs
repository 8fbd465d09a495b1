use async_trait::async_trait;

use crate::errors::DroidClawResult;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, ToolDef};

/// Unified LLM provider trait. All providers implement this trait.
/// New providers only need to implement this trait and register in config.toml.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// One chat completion with the declared tools. Transport failures and
    /// non-success statuses are errors; the reply itself is returned unjudged.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDef>,
        cfg: &CallConfig,
    ) -> DroidClawResult<LlmResponse>;
}
