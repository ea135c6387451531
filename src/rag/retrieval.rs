//! Similarity query followed by a binary LLM relevance check.

use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;

use super::store::{QueryResult, VectorCollection};
use crate::llm::{structured_tool, ChatMessage, LlmChain, ToolDefinition};
use crate::prompts::{fill, BINARY_RANKER};

pub const NO_RELEVANT_DOCUMENTS: &str = "No relevant documents found for your query.";
const TOP_K: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct BinaryRankingResult {
    #[serde(default)]
    pub reasoning: String,
    pub is_relevant: bool,
}

fn ranking_tool() -> ToolDefinition {
    structured_tool(
        "binary_ranking_result",
        "Decision whether the document is relevant to the query.",
        json!({
            "type": "object",
            "properties": {
                "reasoning": {
                    "type": "string",
                    "description": "Reasoning about the document relevance in 2-3 sentences."
                },
                "is_relevant": {
                    "type": "boolean",
                    "description": "True when the document is relevant to the query."
                }
            },
            "required": ["reasoning", "is_relevant"]
        }),
    )
}

/// Classifies each candidate as relevant or not with one LLM call per
/// candidate, all in flight together.
pub struct BinaryRanker {
    llm: LlmChain,
}

impl BinaryRanker {
    pub fn new(llm: LlmChain) -> Self {
        Self { llm }
    }

    /// `(id, is_relevant)` for every candidate, in input order. A failed
    /// classification counts as not relevant.
    pub async fn rank(&self, question: &str, candidates: &[QueryResult]) -> Vec<(String, bool)> {
        let tool = ranking_tool();
        let calls = candidates.iter().map(|candidate| {
            let prompt = fill(
                BINARY_RANKER,
                &[
                    ("question", question),
                    ("filename", &candidate.id),
                    ("document", &candidate.document),
                ],
            );
            let tool = &tool;
            async move {
                self.llm
                    .invoke_structured::<BinaryRankingResult>(&[ChatMessage::user(prompt)], tool)
                    .await
            }
        });

        join_all(calls)
            .await
            .into_iter()
            .zip(candidates)
            .map(|(result, candidate)| match result {
                Ok(ranking) => {
                    tracing::debug!(
                        file = %candidate.id,
                        relevant = ranking.is_relevant,
                        "{}",
                        ranking.reasoning
                    );
                    (candidate.id.clone(), ranking.is_relevant)
                }
                Err(e) => {
                    tracing::warn!("Ranking of {} failed: {}", candidate.id, e);
                    (candidate.id.clone(), false)
                }
            })
            .collect()
    }
}

pub struct Retriever {
    collection: Arc<VectorCollection>,
    ranker: BinaryRanker,
}

impl Retriever {
    pub fn new(collection: Arc<VectorCollection>, ranker: BinaryRanker) -> Self {
        Self { collection, ranker }
    }

    /// Relevant descriptions for `question`, rendered as filename blocks.
    pub async fn retrieve(&self, question: &str) -> anyhow::Result<String> {
        let candidates = self.collection.query(question, TOP_K).await?;
        let ranking = self.ranker.rank(question, &candidates).await;

        let output: String = candidates
            .iter()
            .zip(ranking)
            .filter(|(_, (_, relevant))| *relevant)
            .map(|(hit, _)| format!("{}:\n\n{}\n\n###\n\n", hit.id, hit.document))
            .collect();

        if output.is_empty() {
            Ok(NO_RELEVANT_DOCUMENTS.to_string())
        } else {
            Ok(output)
        }
    }
}
