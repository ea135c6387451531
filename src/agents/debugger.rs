//! Fixes what the human reports after the executor's changes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::executor::{editing_tools, reindex_modified, CodeFile, FileTracker};
use super::frontend_feedback::execute_screenshot_code;
use super::graph::{run_graph, AgentGraph, GraphError, GraphHooks};
use super::AgentContext;
use crate::human::{is_approval, HumanInput};
use crate::llm::{ChatMessage, ToolCall};
use crate::prompts::{fill, DEBUGGER_SYSTEM};
use crate::tools::{AskHuman, FinalResponse};
use crate::workdir::DotDir;

pub const DEBUGGER_STEP_LIMIT: usize = 150;

const REVIEW_PROMPT: &str =
    "Please test app and provide commentary if debugging/additional refinement is needed. ";

struct DebuggerHooks {
    tracker: FileTracker,
    human: Arc<dyn HumanInput>,
}

#[async_trait]
impl GraphHooks for DebuggerHooks {
    fn on_tool_result(&self, call: &ToolCall, args: &Value, result: &str) {
        self.tracker.record(call, args, result);
    }

    async fn after_tools(&self, messages: Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(self.tracker.refresh(messages))
    }

    fn reviews_final(&self) -> bool {
        true
    }

    async fn review_final(&self, _call: &ToolCall, args: &Value) -> anyhow::Result<Option<String>> {
        if let Some(instruction) = args.get("test_instruction").and_then(|v| v.as_str()) {
            println!("Instruction for testing:\n{}\n", instruction);
        }
        let answer = self.human.ask(REVIEW_PROMPT).await?;
        if is_approval(&answer) {
            Ok(None)
        } else {
            Ok(Some(answer))
        }
    }
}

pub struct Debugger {
    ctx: AgentContext,
    graph: AgentGraph,
}

impl Debugger {
    pub fn new(ctx: AgentContext) -> Self {
        let tools = editing_tools(&ctx)
            .with(Arc::new(AskHuman::new(ctx.human.clone())))
            .with(Arc::new(FinalResponse::debugger()));
        let graph = AgentGraph::new(
            "Debugger",
            ctx.llms.mid.named("Debugger"),
            tools,
            &ctx.work_dir,
            DEBUGGER_STEP_LIMIT,
        )
        .with_final_tool("final_response_debugger");
        Self { ctx, graph }
    }

    /// Work on `human_message` until the human accepts the result. Returns the
    /// files worked on.
    pub async fn do_task(
        &self,
        task: &str,
        plan: &str,
        files: &[String],
        human_message: &str,
        image_paths: &[String],
        with_screenshot: bool,
    ) -> Result<Vec<CodeFile>, GraphError> {
        println!("🔧 Debugger here! Let me fix what you found.");
        let hooks = DebuggerHooks {
            tracker: FileTracker::new(&self.ctx.work_dir, files),
            human: self.ctx.human.clone(),
        };
        let system = fill(
            DEBUGGER_SYSTEM,
            &[
                ("task", task),
                ("plan", plan),
                ("project_rules", &self.ctx.coderrules),
                ("dir_tree", &self.ctx.dir_tree()),
            ],
        );

        let mut messages = vec![ChatMessage::system(system), hooks.tracker.contents_message()];
        if let Some(images) = super::planner::template_images_message(&self.ctx.work_dir, image_paths) {
            messages.push(images);
        }
        messages.push(ChatMessage::user(format!(
            "Human reported problems to fix:\n'''\n{}\n'''",
            human_message
        )));
        if with_screenshot {
            let script = DotDir::new(&self.ctx.work_dir).screenshot_script();
            if script.exists() {
                messages.push(execute_screenshot_code(&script).await);
            }
        }

        let outcome = run_graph(&self.graph, messages, &hooks).await?;
        tracing::info!(
            messages = outcome.messages.len(),
            "Debugger finished with {}",
            outcome.final_call.name
        );
        reindex_modified(&self.ctx, &hooks.tracker.modified()).await;
        Ok(hooks.tracker.files())
    }
}
