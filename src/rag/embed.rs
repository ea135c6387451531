//! Embedding client for the OpenAI-compatible `/embeddings` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ProviderKeys;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const OPENROUTER_EMBEDDINGS_URL: &str = "https://openrouter.ai/api/v1/embeddings";

/// Turns text into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct EmbeddingClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(url: impl Into<String>, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key,
            model,
        }
    }

    /// OpenAI when its key is present, otherwise OpenRouter.
    pub fn from_keys(keys: &ProviderKeys, model: &str) -> Option<Self> {
        if let Some(key) = &keys.openai_api_key {
            return Some(Self::new(OPENAI_EMBEDDINGS_URL, key.clone(), model.to_string()));
        }
        keys.openrouter_api_key.as_ref().map(|key| {
            Self::new(
                OPENROUTER_EMBEDDINGS_URL,
                key.clone(),
                format!("openai/{}", model),
            )
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(std::time::Duration::from_secs(60))
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            tracing::error!("Embedding API error: {} - {}", status, text);
            anyhow::bail!("Embedding API error: {} - {}", status, text);
        }

        parse_embedding_response(&text, texts.len())
    }
}

fn parse_embedding_response(body: &str, expected: usize) -> anyhow::Result<Vec<Vec<f32>>> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| anyhow::anyhow!("Failed to parse embedding response: {} - {}", e, body))?;

    let mut data = response.data;
    data.sort_by_key(|d| d.index);
    if data.len() != expected {
        anyhow::bail!(
            "Embedding API returned {} vectors for {} inputs",
            data.len(),
            expected
        );
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Bag-of-words embedder: one dimension per hashed lowercase word.
#[cfg(test)]
pub struct WordHashEmbedder;

#[cfg(test)]
#[async_trait]
impl Embedder for WordHashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        const DIM: usize = 64;
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; DIM];
                for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                    let hash = word
                        .to_lowercase()
                        .bytes()
                        .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                    v[hash % DIM] += 1.0;
                }
                v
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sorts_by_index() {
        let body = r#"{"data": [
            {"embedding": [0.0, 1.0], "index": 1},
            {"embedding": [1.0, 0.0], "index": 0}
        ], "usage": {"prompt_tokens": 2, "total_tokens": 2}}"#;
        let vectors = parse_embedding_response(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(parse_embedding_response(body, 3).is_err());
    }

    #[test]
    fn test_from_keys_prefers_openai() {
        let mut keys = ProviderKeys::default();
        assert!(EmbeddingClient::from_keys(&keys, "text-embedding-3-small").is_none());

        keys.openrouter_api_key = Some("or".to_string());
        let client = EmbeddingClient::from_keys(&keys, "text-embedding-3-small").unwrap();
        assert_eq!(client.model(), "openai/text-embedding-3-small");

        keys.openai_api_key = Some("oa".to_string());
        let client = EmbeddingClient::from_keys(&keys, "text-embedding-3-small").unwrap();
        assert_eq!(client.model(), "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_word_hash_embedder_is_deterministic() {
        let a = WordHashEmbedder.embed("login form").await.unwrap();
        let b = WordHashEmbedder.embed("Login FORM").await.unwrap();
        assert_eq!(a, b);
    }
}
