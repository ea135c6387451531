//! Implements an approved plan by editing project files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::graph::{run_graph, AgentGraph, GraphError, GraphHooks};
use super::AgentContext;
use crate::llm::{ChatMessage, ToolCall};
use crate::prompts::{fill, EXECUTOR_SYSTEM};
use crate::tools::{
    CreateFileWithCode, FinalResponse, InsertCode, ListDir, ReplaceCode, SeeFile, ToolRegistry,
};
use crate::workdir::check_file_contents;

pub const EXECUTOR_STEP_LIMIT: usize = 150;

/// Prefix of the message holding the current contents of tracked files.
pub const FILE_CONTENTS_HEADER: &str = "Current contents of the files you work on:";

/// A project file the agent works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFile {
    pub filename: String,
    pub is_modified: bool,
}

impl CodeFile {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            is_modified: false,
        }
    }
}

/// Result text each editing tool returns when the file was changed.
fn successful_edit(tool: &str) -> Option<&'static str> {
    match tool {
        "insert_code" => Some("Code inserted."),
        "replace_code" => Some("Code modified."),
        "create_file_with_code" => Some("File been created successfully."),
        _ => None,
    }
}

/// Keeps track of the files touched by editing tools and of the message
/// that shows their contents to the model.
pub(crate) struct FileTracker {
    work_dir: PathBuf,
    files: Mutex<Vec<CodeFile>>,
}

impl FileTracker {
    pub(crate) fn new(work_dir: &Path, files: &[String]) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            files: Mutex::new(files.iter().map(CodeFile::new).collect()),
        }
    }

    pub(crate) fn files(&self) -> Vec<CodeFile> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub(crate) fn modified(&self) -> Vec<String> {
        self.files()
            .into_iter()
            .filter(|f| f.is_modified)
            .map(|f| f.filename)
            .collect()
    }

    /// Mark the file of a successful edit as modified, adding it when new.
    pub(crate) fn record(&self, call: &ToolCall, args: &Value, result: &str) {
        let Some(success) = successful_edit(call.name()) else {
            return;
        };
        if result != success {
            return;
        }
        let Some(filename) = args.get("filename").and_then(|v| v.as_str()) else {
            return;
        };
        let filename = filename.trim_start_matches('/');
        if let Ok(mut files) = self.files.lock() {
            match files.iter_mut().find(|f| f.filename == filename) {
                Some(file) => file.is_modified = true,
                None => files.push(CodeFile {
                    filename: filename.to_string(),
                    is_modified: true,
                }),
            }
        }
    }

    pub(crate) fn contents_message(&self) -> ChatMessage {
        let names: Vec<String> = self.files().into_iter().map(|f| f.filename).collect();
        ChatMessage::user(format!(
            "{}\n\n{}",
            FILE_CONTENTS_HEADER,
            check_file_contents(&self.work_dir, &names, true)
        ))
    }

    /// Replace the stale contents message with a fresh one.
    pub(crate) fn refresh(&self, mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let position = messages.iter().position(|m| {
            m.text_content()
                .map(|t| t.starts_with(FILE_CONTENTS_HEADER))
                .unwrap_or(false)
        });
        if let Some(i) = position {
            messages[i] = self.contents_message();
        }
        messages
    }
}

struct ExecutorHooks {
    tracker: FileTracker,
}

#[async_trait]
impl GraphHooks for ExecutorHooks {
    fn on_tool_result(&self, call: &ToolCall, args: &Value, result: &str) {
        self.tracker.record(call, args, result);
    }

    async fn after_tools(&self, messages: Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(self.tracker.refresh(messages))
    }
}

/// Editing tools shared by the executor and the debugger.
pub(crate) fn editing_tools(ctx: &AgentContext) -> ToolRegistry {
    ToolRegistry::empty()
        .with(Arc::new(SeeFile::new(ctx.ignore.clone())))
        .with(Arc::new(ListDir::new(ctx.ignore.clone())))
        .with(Arc::new(InsertCode::new(ctx.ignore.clone(), ctx.human.clone())))
        .with(Arc::new(ReplaceCode::new(ctx.ignore.clone(), ctx.human.clone())))
        .with(Arc::new(CreateFileWithCode::new(
            ctx.ignore.clone(),
            ctx.human.clone(),
        )))
}

/// Re-describe changed files so retrieval sees the new code.
pub(crate) async fn reindex_modified(ctx: &AgentContext, modified: &[String]) {
    let Some(index) = &ctx.index else {
        return;
    };
    if modified.is_empty() {
        return;
    }
    match index.update_descriptions(modified).await {
        Ok(updated) => tracing::info!(files = updated.len(), "Re-indexed modified files"),
        Err(e) => tracing::warn!("Failed to re-index modified files: {}", e),
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub files: Vec<CodeFile>,
    pub test_instruction: String,
}

impl ExecutionResult {
    pub fn filenames(&self) -> Vec<String> {
        self.files.iter().map(|f| f.filename.clone()).collect()
    }
}

pub struct Executor {
    ctx: AgentContext,
    graph: AgentGraph,
}

impl Executor {
    pub fn new(ctx: AgentContext) -> Self {
        let tools = editing_tools(&ctx).with(Arc::new(FinalResponse::executor()));
        let graph = AgentGraph::new(
            "Executor",
            ctx.llms.mid.named("Executor"),
            tools,
            &ctx.work_dir,
            EXECUTOR_STEP_LIMIT,
        )
        .with_final_tool("final_response_executor");
        Self { ctx, graph }
    }

    pub async fn do_task(
        &self,
        task: &str,
        plan: &str,
        files: &[String],
    ) -> Result<ExecutionResult, GraphError> {
        println!("🦾 Executor here! Implementing the plan.");
        let hooks = ExecutorHooks {
            tracker: FileTracker::new(&self.ctx.work_dir, files),
        };
        let system = fill(
            EXECUTOR_SYSTEM,
            &[
                ("project_rules", &self.ctx.coderrules),
                ("dir_tree", &self.ctx.dir_tree()),
            ],
        );
        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user(format!("Task: {}\n\nPlan:\n'''\n{}\n'''", task, plan)),
            hooks.tracker.contents_message(),
        ];

        let outcome = run_graph(&self.graph, messages, &hooks).await?;
        let test_instruction = outcome.final_call.arguments["test_instruction"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let modified = hooks.tracker.modified();
        tracing::info!(modified = modified.len(), "Executor finished");
        reindex_modified(&self.ctx, &modified).await;

        Ok(ExecutionResult {
            files: hooks.tracker.files(),
            test_instruction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::testing::context;
    use crate::human::ScriptedInput;
    use crate::llm::testing::ScriptedLlm;

    #[test]
    fn test_tracker_records_successful_edits_only() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FileTracker::new(dir.path(), &["app.py".to_string()]);
        let args = serde_json::json!({"filename": "app.py"});
        tracker.record(&ToolCall::new("1", "insert_code", "{}"), &args, "Human: no");
        assert!(tracker.modified().is_empty());

        tracker.record(&ToolCall::new("2", "replace_code", "{}"), &args, "Code modified.");
        let created = serde_json::json!({"filename": "/lib/util.py"});
        tracker.record(
            &ToolCall::new("3", "create_file_with_code", "{}"),
            &created,
            "File been created successfully.",
        );
        tracker.record(&ToolCall::new("4", "see_file", "{}"), &args, "Code modified.");
        assert_eq!(tracker.modified(), vec!["app.py", "lib/util.py"]);
    }

    #[tokio::test]
    async fn test_executor_edits_and_refreshes_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();
        let llm = Arc::new(ScriptedLlm::new("mid"));
        llm.push_call(
            "replace_code",
            r#"{"filename": "app.py", "start_line": 1, "end_line": 1, "code": "print('cześć')"}"#,
        );
        llm.push_call(
            "create_file_with_code",
            r#"{"filename": "README.md", "code": "Greets in Polish"}"#,
        );
        llm.push_call("final_response_executor", r#"{"test_instruction": "Run app.py"}"#);
        let human = Arc::new(ScriptedInput::new(["ok", "o"]));
        let executor = Executor::new(context(dir.path(), &llm, &human));

        let result = executor
            .do_task("Greet in Polish", "1. Change greeting", &["app.py".to_string()])
            .await
            .unwrap();

        assert_eq!(result.test_instruction, "Run app.py");
        assert_eq!(result.filenames(), vec!["app.py", "README.md"]);
        assert!(result.files.iter().all(|f| f.is_modified));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.py")).unwrap(),
            "print('cześć')\n"
        );

        let requests = llm.requests();
        assert!(requests[0][2].text_content().unwrap().contains("1|print('hi')"));
        let refreshed = requests[1][2].text_content().unwrap();
        assert!(refreshed.starts_with(FILE_CONTENTS_HEADER));
        assert!(refreshed.contains("1|print('cześć')"));
        assert!(requests[2][2].text_content().unwrap().contains("File: README.md"));
    }
}
