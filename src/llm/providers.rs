//! Provider chains built from the configured keys.
//!
//! Priority is fixed per tier. Keys that are absent simply drop their
//! models from the chain.

use std::sync::Arc;

use super::{
    AnthropicClient, ChatModel, ChatOptions, LlmChain, LlmClient, LlmError, OpenAiCompatibleClient,
};
use crate::config::{Config, ProviderKeys};

/// The three model tiers used by the agents.
#[derive(Clone, Debug)]
pub struct LlmTiers {
    /// Default tier: researcher, executor, debugger, manager.
    pub mid: LlmChain,
    /// Cheap tier: descriptions, relevance ranking, progress notes.
    pub mini: LlmChain,
    /// Strong tier: planner.
    pub high: LlmChain,
}

struct Clients {
    anthropic: Option<Arc<dyn LlmClient>>,
    openrouter: Option<Arc<dyn LlmClient>>,
    openai: Option<Arc<dyn LlmClient>>,
    ollama: Option<(Arc<dyn LlmClient>, String)>,
    local: Option<(Arc<dyn LlmClient>, String)>,
}

impl Clients {
    fn from_keys(keys: &ProviderKeys) -> Self {
        let arc = |c: OpenAiCompatibleClient| -> Arc<dyn LlmClient> { Arc::new(c) };
        Self {
            anthropic: keys
                .anthropic_api_key
                .clone()
                .map(|k| Arc::new(AnthropicClient::new(k)) as Arc<dyn LlmClient>),
            openrouter: keys
                .openrouter_api_key
                .clone()
                .map(|k| arc(OpenAiCompatibleClient::openrouter(k))),
            openai: keys
                .openai_api_key
                .clone()
                .map(|k| arc(OpenAiCompatibleClient::openai(k))),
            ollama: keys.ollama_model.clone().map(|model| {
                (arc(OpenAiCompatibleClient::ollama(&keys.ollama_base_url)), model)
            }),
            local: match (&keys.local_model_api_base, &keys.local_model_name) {
                (Some(base), Some(name)) => {
                    Some((arc(OpenAiCompatibleClient::local(base)), name.clone()))
                }
                _ => None,
            },
        }
    }

    fn push_local(&self, models: &mut Vec<ChatModel>, options: &ChatOptions) {
        if let Some((client, model)) = &self.ollama {
            models.push(ChatModel::new(client.clone(), model.clone()).with_options(options.clone()));
        }
        if let Some((client, model)) = &self.local {
            models.push(ChatModel::new(client.clone(), model.clone()).with_options(options.clone()));
        }
    }
}

fn model(client: &Arc<dyn LlmClient>, name: &str, options: ChatOptions) -> ChatModel {
    ChatModel::new(client.clone(), name).with_options(options)
}

impl LlmTiers {
    /// Tiers for `config`; fails when no provider is configured at all.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        if !config.providers.any() {
            return Err(LlmError::NoProviders("Clean Coder".to_string()));
        }
        Ok(Self::from_keys(&config.providers))
    }

    pub fn from_keys(keys: &ProviderKeys) -> Self {
        let clients = Clients::from_keys(keys);
        let tiers = Self {
            mid: Self::mid(&clients, 0.0),
            mini: Self::mini(&clients),
            high: Self::high(&clients),
        };
        tracing::info!(
            "LLM chains: mid={} mini={} high={} model(s)",
            tiers.mid.len(),
            tiers.mini.len(),
            tiers.high.len()
        );
        tiers
    }

    fn mid(clients: &Clients, temperature: f64) -> LlmChain {
        let opts = ChatOptions::default().with_temperature(temperature);
        let mut models = Vec::new();
        if let Some(c) = &clients.anthropic {
            models.push(model(
                c,
                "claude-3-5-sonnet-20241022",
                opts.clone().with_max_tokens(2048),
            ));
        }
        if let Some(c) = &clients.openrouter {
            models.push(model(c, "anthropic/claude-3.5-sonnet", ChatOptions::default()));
        }
        if let Some(c) = &clients.openai {
            models.push(model(c, "gpt-4o", opts.clone()));
        }
        clients.push_local(&mut models, &ChatOptions::default());
        LlmChain::new("Clean Coder", models)
    }

    fn mini(clients: &Clients) -> LlmChain {
        let opts = ChatOptions::default().with_temperature(0.0);
        let mut models = Vec::new();
        if let Some(c) = &clients.anthropic {
            models.push(model(c, "claude-3-5-haiku-20241022", opts.clone()));
        }
        if let Some(c) = &clients.openrouter {
            models.push(model(c, "anthropic/claude-3.5-haiku", ChatOptions::default()));
        }
        if let Some(c) = &clients.openai {
            models.push(model(c, "gpt-4o-mini", opts.clone()));
        }
        clients.push_local(&mut models, &ChatOptions::default());
        LlmChain::new("Clean Coder mini", models)
    }

    fn high(clients: &Clients) -> LlmChain {
        let opts = ChatOptions::default().with_temperature(0.2);
        // Reasoning models only accept the default temperature.
        let reasoning = ChatOptions::default().with_temperature(1.0);
        let mut models = Vec::new();
        if let Some(c) = &clients.openai {
            models.push(model(c, "o3-mini", reasoning.clone()));
            models.push(model(c, "o1", reasoning));
        }
        if let Some(c) = &clients.openrouter {
            models.push(model(c, "openai/gpt-4o", ChatOptions::default()));
        }
        if let Some(c) = &clients.openai {
            models.push(model(c, "gpt-4o", opts.clone()));
        }
        if let Some(c) = &clients.anthropic {
            models.push(model(
                c,
                "claude-3-5-sonnet-20241022",
                opts.clone().with_max_tokens(2048),
            ));
        }
        clients.push_local(&mut models, &ChatOptions::default());
        LlmChain::new("Clean Coder high", models)
    }

    /// Every tier bound to the same chain (tests and single-provider setups).
    pub fn uniform(chain: LlmChain) -> Self {
        Self {
            mid: chain.clone(),
            mini: chain.clone(),
            high: chain,
        }
    }
}
