//! Writes the plan of changes and iterates on it with the human.

use std::path::Path;

use super::graph::{interrupted, GraphError, StepBudget};
use super::AgentContext;
use crate::human::is_approval;
use crate::llm::{ChatMessage, ContentPart};
use crate::prompts::{fill, PLANNER_HUMAN_PROMPT, PLANNER_SYSTEM};
use crate::util::join_paths;
use crate::workdir::check_file_contents;

pub const PLANNER_STEP_LIMIT: usize = 50;

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// User message carrying template images, each preceded by its path.
/// Unreadable images are skipped.
pub fn template_images_message(work_dir: &Path, image_paths: &[String]) -> Option<ChatMessage> {
    let mut parts = Vec::new();
    for image in image_paths {
        let path = join_paths(work_dir, image);
        match std::fs::read(&path) {
            Ok(bytes) => {
                parts.push(ContentPart::text(format!("Template image: {}", image)));
                parts.push(ContentPart::image_bytes(image_mime(&path), &bytes));
            }
            Err(e) => tracing::warn!("Skipping template image {}: {}", image, e),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(ChatMessage::user_parts(parts))
    }
}

pub struct Planner {
    ctx: AgentContext,
}

impl Planner {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    fn initial_messages(
        &self,
        task: &str,
        files: &[String],
        image_paths: &[String],
        documentation: Option<&str>,
    ) -> Vec<ChatMessage> {
        let documentation = documentation
            .map(|docs| format!("\nDocumentation of libraries you may use:\n'''\n{}\n'''\n", docs))
            .unwrap_or_default();
        let system = fill(
            PLANNER_SYSTEM,
            &[
                ("project_rules", &self.ctx.coderrules),
                (
                    "file_contents",
                    &check_file_contents(&self.ctx.work_dir, files, false),
                ),
                ("dir_tree", &self.ctx.dir_tree()),
                ("documentation", &documentation),
            ],
        );

        let mut messages = vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("Task:\n'''{}'''", task)),
        ];
        if let Some(images) = template_images_message(&self.ctx.work_dir, image_paths) {
            messages.push(images);
        }
        messages
    }

    /// Plan accepted by the human.
    pub async fn plan(
        &self,
        task: &str,
        files: &[String],
        image_paths: &[String],
        documentation: Option<&str>,
    ) -> Result<String, GraphError> {
        println!("📈 Planner here! Create plan of changes with me!");
        let llm = self.ctx.llms.high.named("Planner");
        let mut messages = self.initial_messages(task, files, image_paths, documentation);
        let mut budget = StepBudget::new("Planner", PLANNER_STEP_LIMIT);

        loop {
            budget.step()?;
            let response = llm
                .invoke(&messages, None)
                .await
                .map_err(|e| GraphError::Llm {
                    graph: "Planner".to_string(),
                    message: e.to_string(),
                })?;
            let plan = response.content.unwrap_or_default();
            println!("{}\n", plan);
            messages.push(ChatMessage::assistant(plan.clone()));

            budget.step()?;
            let answer = self
                .ctx
                .human
                .ask(PLANNER_HUMAN_PROMPT)
                .await
                .map_err(interrupted)?;
            if is_approval(&answer) {
                messages.push(ChatMessage::user("Approved by human"));
                tracing::info!(revisions = budget.used() / 2, "Plan approved");
                return Ok(plan);
            }
            messages.push(ChatMessage::user(format!(
                "Plan been rejected by human. Improve it following his commentary: {}",
                answer
            )));
        }
    }
}
