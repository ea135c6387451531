//! Scripted LLM client used by unit tests across the crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    ChatMessage, ChatModel, ChatOptions, ChatResponse, LlmChain, LlmClient, Role, ToolCall,
    ToolDefinition,
};

enum Scripted {
    Response(ChatResponse),
    Error(String),
}

/// Returns queued responses in order and records every request.
pub struct ScriptedLlm {
    name: String,
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    tool_choices: Mutex<Vec<Option<String>>>,
    echo: bool,
    responder: Option<Box<Responder>>,
}

type Responder = dyn Fn(&[ChatMessage]) -> ChatResponse + Send + Sync;

impl ScriptedLlm {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queue: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            tool_choices: Mutex::new(Vec::new()),
            echo: false,
            responder: None,
        }
    }

    /// Answer with the text of the last user message when the queue is empty.
    pub fn echo_last_user(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Compute the answer from the request when the queue is empty.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> ChatResponse + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Response holding one tool call.
    pub fn call_response(name: &str, args: &str) -> ChatResponse {
        ChatResponse {
            tool_calls: Some(vec![ToolCall::new("call_r", name, args)]),
            ..Default::default()
        }
    }

    pub fn push_text(&self, text: &str) {
        self.push(ChatResponse {
            content: Some(text.to_string()),
            ..Default::default()
        });
    }

    /// Queue a response made of tool calls `(name, json arguments)`.
    pub fn push_calls(&self, calls: &[(&str, &str)]) {
        let offset = self.queue.lock().map(|q| q.len()).unwrap_or(0);
        let calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, args))| ToolCall::new(format!("call_{}_{}", offset, i), *name, *args))
            .collect();
        self.push(ChatResponse {
            tool_calls: Some(calls),
            ..Default::default()
        });
    }

    pub fn push_call(&self, name: &str, args: &str) {
        self.push_calls(&[(name, args)]);
    }

    pub fn push(&self, response: ChatResponse) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Scripted::Response(response));
        }
    }

    pub fn push_error(&self, message: &str) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Scripted::Error(message.to_string()));
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn last_tool_choice(&self) -> Option<String> {
        self.tool_choices
            .lock()
            .ok()
            .and_then(|c| c.last().cloned().flatten())
    }

    /// Single-model chain around this client.
    pub fn chain(llm: &Arc<Self>) -> LlmChain {
        LlmChain::new(llm.name.clone(), vec![ChatModel::new(llm.clone(), "scripted")])
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        _model: &str,
        messages: &[ChatMessage],
        _tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
        if let Ok(mut c) = self.tool_choices.lock() {
            c.push(options.tool_choice.clone());
        }

        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(anyhow::anyhow!("{}", message)),
            None if self.responder.is_some() => {
                let responder = self.responder.as_ref().map(|r| r(messages));
                responder.ok_or_else(|| anyhow::anyhow!("{}: script exhausted", self.name))
            }
            None if self.echo => {
                let text = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .and_then(|m| m.text_content())
                    .unwrap_or_default()
                    .to_string();
                Ok(ChatResponse {
                    content: Some(text),
                    ..Default::default()
                })
            }
            None => Err(anyhow::anyhow!("{}: script exhausted", self.name)),
        }
    }
}
