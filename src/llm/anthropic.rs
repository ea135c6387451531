//! Anthropic Messages API client.
//!
//! Converts the OpenAI-style conversation used everywhere else into the
//! Messages format: the system prompt moves to its own field, tool results
//! become `tool_result` blocks in user turns and consecutive turns of the
//! same role are merged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{from_reqwest, LlmError};
use super::{
    ChatMessage, ChatOptions, ChatResponse, ContentPart, LlmClient, MessageContent, Role,
    TokenUsage, ToolCall, ToolDefinition,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u64 = 4096;

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    api_version: String,
}

impl AnthropicClient {
    /// Create a client with the default base URL.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, ANTHROPIC_API_BASE.to_string())
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self {
            http,
            api_key,
            base_url,
            api_version: "2023-06-01".into(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        let request = build_request(model, messages, tools, &options);
        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!("Sending request to anthropic: model={}", model);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| from_reqwest("anthropic", e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| from_reqwest("anthropic", e))?;
        if status >= 400 {
            return Err(LlmError::http("anthropic", status, &body).into());
        }

        let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error("anthropic", format!("failed to parse response: {e}"))
        })?;
        Ok(parsed.into_chat_response())
    }
}

/// Request body for the Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u64,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

fn build_request(
    model: &str,
    messages: &[ChatMessage],
    tools: Option<&[ToolDefinition]>,
    options: &ChatOptions,
) -> MessagesRequest {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .filter_map(|m| m.text_content())
        .collect();

    let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();
    for message in messages.iter().filter(|m| m.role != Role::System) {
        let (role, blocks) = convert_message(message);
        if blocks.is_empty() {
            continue;
        }
        match turns.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => turns.push((role, blocks)),
        }
    }

    let tools: Vec<Value> = tools
        .unwrap_or_default()
        .iter()
        .map(|t| {
            json!({
                "name": t.function.name,
                "description": t.function.description,
                "input_schema": t.function.parameters,
            })
        })
        .collect();

    let tool_choice = match &options.tool_choice {
        Some(name) if !tools.is_empty() => Some(json!({"type": "tool", "name": name})),
        _ => None,
    };

    MessagesRequest {
        model: model.to_string(),
        max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        messages: turns
            .into_iter()
            .map(|(role, content)| json!({"role": role, "content": content}))
            .collect(),
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        temperature: options.temperature,
        top_p: options.top_p,
        tools,
        tool_choice,
    }
}

fn convert_message(message: &ChatMessage) -> (&'static str, Vec<Value>) {
    match message.role {
        Role::Tool => {
            let text = message.text_content().unwrap_or_default();
            (
                "user",
                vec![json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": text,
                })],
            )
        }
        Role::Assistant => {
            let mut blocks = content_blocks(message.content.as_ref());
            for call in message.tool_calls.iter().flatten() {
                let input = call.parsed_arguments().unwrap_or_else(|_| json!({}));
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.function.name,
                    "input": input,
                }));
            }
            ("assistant", blocks)
        }
        Role::User | Role::System => ("user", content_blocks(message.content.as_ref())),
    }
}

fn content_blocks(content: Option<&MessageContent>) -> Vec<Value> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) if text.trim().is_empty() => Vec::new(),
        Some(MessageContent::Text(text)) => vec![json!({"type": "text", "text": text})],
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(json!({"type": "text", "text": text})),
                ContentPart::ImageUrl { image_url } => image_block(&image_url.url),
            })
            .collect(),
    }
}

/// `data:` URLs become inline base64 sources, anything else a URL source.
fn image_block(url: &str) -> Option<Value> {
    if let Some(rest) = url.strip_prefix("data:") {
        let (mime, data) = rest.split_once(";base64,")?;
        return Some(json!({
            "type": "image",
            "source": {"type": "base64", "media_type": mime, "data": data},
        }));
    }
    Some(json!({"type": "image", "source": {"type": "url", "url": url}}))
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl MessagesResponse {
    fn into_chat_response(self) -> ChatResponse {
        let mut text = String::new();
        let mut calls = Vec::new();
        for block in self.content {
            match block {
                ResponseBlock::Text { text: t } => text.push_str(&t),
                ResponseBlock::ToolUse { id, name, input } => {
                    calls.push(ToolCall::new(id, name, input.to_string()))
                }
                ResponseBlock::Other => {}
            }
        }
        ChatResponse {
            content: (!text.is_empty()).then_some(text),
            tool_calls: (!calls.is_empty()).then_some(calls),
            finish_reason: self.stop_reason,
            usage: self
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
            model: self.model,
        }
    }
}
