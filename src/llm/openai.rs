//! OpenAI-compatible chat completions client.
//!
//! One implementation serves OpenAI, OpenRouter, Ollama (`/v1`) and any
//! local server speaking the same protocol; they differ only in base URL,
//! key and extra headers. Requests are sent once: a failure is reported to
//! the fallback chain, which moves on to the next provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{from_reqwest, LlmError};
use super::{
    ChatMessage, ChatOptions, ChatResponse, LlmClient, TokenUsage, ToolCall, ToolDefinition,
};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Timeout for hosted providers.
pub const HOSTED_TIMEOUT: Duration = Duration::from_secs(60);
/// Local models are slower to answer.
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(90);

/// Chat client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatibleClient {
    client: Client,
    provider: String,
    base_url: String,
    api_key: Option<String>,
    extra_headers: Vec<(String, String)>,
}

impl OpenAiCompatibleClient {
    /// Create a client for `base_url` (without the `/chat/completions` suffix).
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self {
            client,
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            extra_headers: Vec::new(),
        }
    }

    pub fn openai(api_key: String) -> Self {
        Self::new("openai", OPENAI_API_BASE, Some(api_key), HOSTED_TIMEOUT)
    }

    pub fn openrouter(api_key: String) -> Self {
        Self::new("openrouter", OPENROUTER_API_BASE, Some(api_key), HOSTED_TIMEOUT)
            .with_header("HTTP-Referer", "https://github.com/Grigorij-Dudnik/Clean-Coder-AI")
            .with_header("X-Title", "Clean Coder")
    }

    /// Ollama's OpenAI-compatible endpoint on `base_url` (e.g. `http://localhost:11434`).
    pub fn ollama(base_url: &str) -> Self {
        Self::new(
            "ollama",
            format!("{}/v1", base_url.trim_end_matches('/')),
            None,
            LOCAL_TIMEOUT,
        )
    }

    /// A local server; it is sent a placeholder key since most require one.
    pub fn local(api_base: &str) -> Self {
        Self::new(
            "local",
            api_base,
            Some("n/a".to_string()),
            LOCAL_TIMEOUT,
        )
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Execute a single request.
    async fn execute_request(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut builder = self
            .client
            .post(self.chat_url())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        for (name, value) in &self.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .json(request)
            .send()
            .await
            .map_err(|e| from_reqwest(&self.provider, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| from_reqwest(&self.provider, e))?;

        if !status.is_success() {
            return Err(LlmError::http(&self.provider, status.as_u16(), &body));
        }

        parse_chat_response(&self.provider, &request.model, &body)
    }
}

fn parse_chat_response(provider: &str, model: &str, body: &str) -> Result<ChatResponse, LlmError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::parse_error(provider, format!("Failed to parse response: {}, body: {}", e, body))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::parse_error(provider, "No choices in response".to_string()))?;

    Ok(ChatResponse {
        content: choice.message.content.filter(|c| !c.is_empty()),
        tool_calls: choice.message.tool_calls.filter(|calls| !calls.is_empty()),
        finish_reason: choice.finish_reason,
        usage: parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        model: parsed.model.or_else(|| Some(model.to_string())),
    })
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        let tool_choice = match (&options.tool_choice, tools) {
            (Some(name), Some(_)) => Some(serde_json::json!({
                "type": "function",
                "function": { "name": name }
            })),
            (None, Some(_)) => Some(serde_json::json!("auto")),
            _ => None,
        };

        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.map(|t| t.to_vec()),
            tool_choice,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
        };

        tracing::debug!("Sending request to {}: model={}", self.provider, model);

        Ok(self.execute_request(&request).await?)
    }
}

/// Chat completions request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_call_response() {
        let body = r#"{
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "see_file", "arguments": "{\"filename\":\"a.py\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let response = parse_chat_response("openai", "gpt-4o", body).unwrap();
        assert!(response.content.is_none());
        assert_eq!(response.calls().len(), 1);
        assert_eq!(response.calls()[0].name(), "see_file");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_error_on_empty_choices() {
        let err = parse_chat_response("local", "m", r#"{"choices": []}"#).unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }

    #[test]
    fn test_ollama_url() {
        let client = OpenAiCompatibleClient::ollama("http://localhost:11434/");
        assert_eq!(client.chat_url(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(client.provider(), "ollama");
    }
}
