//! Ordered provider chains with automatic fallback.

use std::sync::Arc;

use futures::future::join_all;

use super::error::LlmError;
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, ToolDefinition};

/// A client bound to a model name and default options.
#[derive(Clone)]
pub struct ChatModel {
    pub client: Arc<dyn LlmClient>,
    pub model: String,
    pub options: ChatOptions,
}

impl ChatModel {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    fn label(&self) -> String {
        format!("{}/{}", self.client.provider(), self.model)
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("provider", &self.client.provider())
            .field("model", &self.model)
            .finish()
    }
}

/// Providers tried in priority order. The first success wins; when every
/// model fails, the last error is returned.
#[derive(Clone, Debug)]
pub struct LlmChain {
    name: String,
    models: Vec<ChatModel>,
}

impl LlmChain {
    pub fn new(name: impl Into<String>, models: Vec<ChatModel>) -> Self {
        Self {
            name: name.into(),
            models,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Same providers under another run name (used in logs).
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: self.models.clone(),
        }
    }

    /// Send `messages` to the first model that answers.
    pub async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> anyhow::Result<ChatResponse> {
        self.invoke_inner(messages, tools, None).await
    }

    /// Like [`invoke`](Self::invoke) but forces the model to call `tool_name`.
    pub async fn invoke_forced_tool(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_name: &str,
    ) -> anyhow::Result<ChatResponse> {
        self.invoke_inner(messages, Some(tools), Some(tool_name))
            .await
    }

    async fn invoke_inner(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        forced_tool: Option<&str>,
    ) -> anyhow::Result<ChatResponse> {
        if self.models.is_empty() {
            return Err(LlmError::NoProviders(self.name.clone()).into());
        }

        let mut last_error = None;
        for (idx, model) in self.models.iter().enumerate() {
            let mut options = model.options.clone();
            if let Some(tool) = forced_tool {
                options.tool_choice = Some(tool.to_string());
            }

            match model
                .client
                .complete(&model.model, messages, tools, options)
                .await
            {
                Ok(response) => {
                    if idx > 0 {
                        tracing::info!(
                            chain = %self.name,
                            "Answered by fallback model {} after {} failure(s)",
                            model.label(),
                            idx
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(
                        chain = %self.name,
                        "Model {} failed: {}",
                        model.label(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::NoProviders(self.name.clone()).into()))
    }

    /// Invoke every conversation concurrently; results keep input order.
    pub async fn batch(
        &self,
        conversations: Vec<Vec<ChatMessage>>,
    ) -> Vec<anyhow::Result<ChatResponse>> {
        join_all(
            conversations
                .iter()
                .map(|messages| self.invoke(messages, None)),
        )
        .await
    }
}
