//! Finds the files the programmer will need for a task.

use std::sync::Arc;

use serde::Deserialize;

use super::graph::{run_graph, AgentGraph, GraphError, NoHooks};
use super::AgentContext;
use crate::llm::ChatMessage;
use crate::prompts::{fill, RESEARCHER_RETRIEVAL_HINT, RESEARCHER_SYSTEM};
use crate::tools::{FinalResponse, ListDir, RetrieveFilesBySemanticQuery, SeeFile, ToolRegistry};

pub const RESEARCHER_STEP_LIMIT: usize = 100;

/// Files and template images chosen for the task.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ResearchResult {
    #[serde(default)]
    pub reasoning: String,
    #[serde(rename = "files_for_executor", default)]
    pub files: Vec<String>,
    #[serde(rename = "template_images", default)]
    pub image_paths: Vec<String>,
}

pub struct Researcher {
    ctx: AgentContext,
    graph: AgentGraph,
}

impl Researcher {
    pub fn new(ctx: AgentContext) -> Self {
        let mut tools = ToolRegistry::empty()
            .with(Arc::new(ListDir::new(ctx.ignore.clone())))
            .with(Arc::new(SeeFile::new(ctx.ignore.clone())))
            .with(Arc::new(FinalResponse::researcher()));
        if let Some(retriever) = &ctx.retriever {
            tools.register(Arc::new(RetrieveFilesBySemanticQuery::new(retriever.clone())));
        }

        let graph = AgentGraph::new(
            "Researcher",
            ctx.llms.mid.named("Researcher"),
            tools,
            &ctx.work_dir,
            RESEARCHER_STEP_LIMIT,
        )
        .with_final_tool("final_response_researcher");
        Self { ctx, graph }
    }

    fn system_message(&self) -> ChatMessage {
        let hint = if self.ctx.retriever.is_some() {
            RESEARCHER_RETRIEVAL_HINT
        } else {
            ""
        };
        ChatMessage::system(fill(
            RESEARCHER_SYSTEM,
            &[
                ("retrieval_hint", hint),
                ("project_rules", &self.ctx.coderrules),
                ("dir_tree", &self.ctx.dir_tree()),
            ],
        ))
    }

    pub async fn research_task(&self, task: &str) -> Result<ResearchResult, GraphError> {
        println!("👀 Researcher here! Let me find the files we will work on.");
        let messages = vec![self.system_message(), ChatMessage::user(format!("Task: {}", task))];
        let outcome = run_graph(&self.graph, messages, &NoHooks).await?;

        let result: ResearchResult = serde_json::from_value(outcome.final_call.arguments)
            .map_err(|e| anyhow::anyhow!("Invalid researcher response: {}", e))?;
        tracing::info!(
            files = result.files.len(),
            images = result.image_paths.len(),
            "Research finished"
        );
        println!("Files to work on: {}", result.files.join(", "));
        Ok(result)
    }
}
