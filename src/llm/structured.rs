//! Structured output through a forced tool call.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ChatMessage, FunctionDefinition, LlmChain, ToolDefinition};

/// Build the tool definition a structured answer is returned through.
pub fn structured_tool(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

/// First balanced `{...}` object in `text`, for models that answer in prose.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&text[start..start + offset + 1]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

impl LlmChain {
    /// Ask for an answer shaped like `T`, returned as arguments of `tool`.
    pub async fn invoke_structured<T: DeserializeOwned>(
        &self,
        messages: &[ChatMessage],
        tool: &ToolDefinition,
    ) -> anyhow::Result<T> {
        let tools = std::slice::from_ref(tool);
        let response = self
            .invoke_forced_tool(messages, tools, &tool.function.name)
            .await?;

        let value = match response.calls().first() {
            Some(call) => call.parsed_arguments()?,
            None => response
                .content
                .as_deref()
                .and_then(extract_json_object)
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Model returned no '{}' call and no JSON object",
                        tool.function.name
                    )
                })?,
        };

        Ok(serde_json::from_value(value)?)
    }
}
