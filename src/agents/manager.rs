//! Project manager: plans the project in the task tracker and hands tasks
//! to the single task pipeline one at a time.
//!
//! The conversation is long lived. It is checkpointed to
//! `.clean_coder/manager_messages.json` before every model call and trimmed
//! after it, and the tasks-and-progress message at index 1 is rebuilt from
//! the tracker after every tool call.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::graph::{run_graph, AgentGraph, GraphError, GraphHooks, GraphOutcome};
use super::AgentContext;
use crate::checkpoint::Checkpoint;
use crate::config::work_dir_name;
use crate::context::{cut_off_context, CONTEXT_WINDOW_MESSAGES};
use crate::human::{HumanInput, InputClosed};
use crate::llm::ChatMessage;
use crate::pipeline::run_clean_coder_pipeline;
use crate::prompts::{
    fill, ACTUALIZE_PROGRESS, MANAGER_PROGRESS, MANAGER_SYSTEM, PROJECT_PLAN_QUESTION,
    TASKS_AND_PROGRESS_HEADER,
};
use crate::tools::{
    AddTask, AskHuman, CreateEpic, FinishProjectPlanning, ListDir, ModifyEpic, ModifyTask,
    ProjectBoard, ReorderTasks, SeeFile, TaskRunner, ToolRegistry,
};
use crate::tracker::{format_tasks_and_epics, TaskTracker};
use crate::workdir::{read_or_empty_marker, DotDir};

pub const MANAGER_STEP_LIMIT: usize = 1000;

pub const PLANNING_CHOICES: [&str; 2] = [
    "Start/continue planning my project (Default)",
    "Project is fully planned in Todoist, just execute tasks",
];

const EXECUTE_ONLY_MESSAGE: &str =
    "Tasks are completely done and all you need to do is to execute them.";

// ============================================================================
// Tracker project
// ============================================================================

fn store_project_id(work_dir: &Path, project_id: &str) -> anyhow::Result<()> {
    let env_file = DotDir::new(work_dir).env_file();
    if let Some(parent) = env_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&env_file)?;
    writeln!(file, "TODOIST_PROJECT_ID={}", project_id)?;
    std::env::set_var("TODOIST_PROJECT_ID", project_id);
    Ok(())
}

async fn create_project(tracker: &dyn TaskTracker, work_dir: &Path) -> anyhow::Result<String> {
    let name = format!("Clean_Coder_{}", work_dir_name(work_dir));
    match tracker.create_project(&name).await {
        Ok(project) => {
            tracing::info!(project = %project.id, "Created Todoist project {}", name);
            Ok(project.id)
        }
        Err(e) => {
            tracing::error!("Creating Todoist project failed: {}", e);
            anyhow::bail!("You have too much projects in Todoist, can't create new one.")
        }
    }
}

/// Id of the tracker project the manager works in. Without a configured id
/// the human picks an existing project or a new one is created; the choice
/// is stored in `.clean_coder/.env`.
pub async fn connect_tracker_project(
    tracker: &dyn TaskTracker,
    human: &dyn HumanInput,
    work_dir: &Path,
    configured: Option<&str>,
) -> anyhow::Result<String> {
    if let Some(id) = configured {
        return Ok(id.to_string());
    }

    let projects = tracker.list_projects().await?;
    let project_id = if projects.is_empty() {
        create_project(tracker, work_dir).await?
    } else {
        let choice = human
            .choose(
                "No project connected. Do you want to create a new project or use existing one?",
                &["Create new project", "Use existing project"],
            )
            .await?;
        if choice == 0 {
            create_project(tracker, work_dir).await?
        } else {
            let labels: Vec<String> = projects
                .iter()
                .map(|p| format!("{} (ID: {})", p.name, p.id))
                .collect();
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            let selected = human.choose("Select a project to connect:", &labels).await?;
            projects[selected.min(projects.len() - 1)].id.clone()
        }
    };
    store_project_id(work_dir, &project_id)?;
    Ok(project_id)
}

// ============================================================================
// Progress
// ============================================================================

/// Rebuilt tasks-and-progress message.
async fn tasks_and_progress_message(board: &ProjectBoard, dot: &DotDir) -> anyhow::Result<ChatMessage> {
    let tracker = board.tracker();
    let (tasks, epics) = tokio::try_join!(
        tracker.get_tasks(board.project_id()),
        tracker.get_epics(board.project_id())
    )?;
    let progress_description = read_or_empty_marker(&dot.progress_description());
    Ok(ChatMessage::user(fill(
        MANAGER_PROGRESS,
        &[
            ("tasks", &format_tasks_and_epics(&epics, &tasks)),
            ("progress_description", &progress_description),
        ],
    )))
}

fn is_progress_message(message: &ChatMessage) -> bool {
    message
        .text_content()
        .map(|t| t.starts_with(TASKS_AND_PROGRESS_HEADER))
        .unwrap_or(false)
}

/// Drop stale progress messages and put `fresh` right after the system prompt.
fn replace_progress_message(mut messages: Vec<ChatMessage>, fresh: ChatMessage) -> Vec<ChatMessage> {
    messages.retain(|m| !is_progress_message(m));
    let at = 1.min(messages.len());
    messages.insert(at, fresh);
    messages
}

struct ManagerHooks {
    checkpoint: Checkpoint,
    board: ProjectBoard,
    dot: DotDir,
}

#[async_trait]
impl GraphHooks for ManagerHooks {
    async fn before_agent(&self, messages: &[ChatMessage]) -> anyhow::Result<()> {
        self.checkpoint.save(messages).await
    }

    async fn after_agent(&self, messages: Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(cut_off_context(messages, CONTEXT_WINDOW_MESSAGES))
    }

    async fn after_tools(&self, messages: Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> {
        let fresh = tasks_and_progress_message(&self.board, &self.dot).await?;
        Ok(replace_progress_message(messages, fresh))
    }
}

// ============================================================================
// Task execution
// ============================================================================

/// Runs picked tasks through the pipeline and keeps the progress
/// description current.
pub struct PipelineRunner {
    ctx: AgentContext,
    doc_harvest: bool,
}

impl PipelineRunner {
    pub fn new(ctx: AgentContext, doc_harvest: bool) -> Self {
        Self { ctx, doc_harvest }
    }
}

#[async_trait]
impl TaskRunner for PipelineRunner {
    async fn run_task(&self, task_name_description: &str) -> anyhow::Result<()> {
        match run_clean_coder_pipeline(&self.ctx, task_name_description, self.doc_harvest).await {
            Ok(outcome) => {
                tracing::info!(files = outcome.files.len(), debugged = outcome.debugged, "Task executed");
                Ok(())
            }
            Err(GraphError::Interrupted) => Err(InputClosed.into()),
            Err(e) => Err(anyhow::anyhow!("Task execution failed: {}", e)),
        }
    }

    async fn actualize_progress(
        &self,
        task_name_description: &str,
        tester_response: &str,
    ) -> anyhow::Result<()> {
        let dot = DotDir::new(&self.ctx.work_dir);
        let prompt = fill(
            ACTUALIZE_PROGRESS,
            &[
                ("progress_description", &read_or_empty_marker(&dot.progress_description())),
                ("task_name_description", task_name_description),
                ("tester_response", tester_response),
            ],
        );
        let response = self
            .ctx
            .llms
            .mid
            .named("Progress description")
            .invoke(&[ChatMessage::user(prompt)], None)
            .await?;
        tokio::fs::write(dot.progress_description(), response.content.unwrap_or_default()).await?;
        println!("Writing description of progress done.");
        Ok(())
    }
}

// ============================================================================
// Manager
// ============================================================================

pub struct Manager {
    ctx: AgentContext,
    board: ProjectBoard,
    runner: Arc<dyn TaskRunner>,
    dot: DotDir,
}

impl Manager {
    pub fn new(ctx: AgentContext, board: ProjectBoard) -> Self {
        let runner = Arc::new(PipelineRunner::new(ctx.clone(), false));
        Self::with_runner(ctx, board, runner)
    }

    pub fn with_runner(ctx: AgentContext, board: ProjectBoard, runner: Arc<dyn TaskRunner>) -> Self {
        let dot = DotDir::new(&ctx.work_dir);
        Self {
            ctx,
            board,
            runner,
            dot,
        }
    }

    fn graph(&self) -> AgentGraph {
        let human = self.ctx.human.clone();
        let tools = ToolRegistry::empty()
            .with(Arc::new(AddTask::new(self.board.clone(), human.clone())))
            .with(Arc::new(ModifyTask::new(self.board.clone(), human.clone())))
            .with(Arc::new(ReorderTasks::new(self.board.clone())))
            .with(Arc::new(CreateEpic::new(self.board.clone())))
            .with(Arc::new(ModifyEpic::new(self.board.clone())))
            .with(Arc::new(ListDir::new(self.ctx.ignore.clone())))
            .with(Arc::new(SeeFile::new(self.ctx.ignore.clone())))
            .with(Arc::new(AskHuman::new(human.clone())))
            .with(Arc::new(FinishProjectPlanning::new(
                self.board.clone(),
                human,
                self.runner.clone(),
            )));
        AgentGraph::new(
            "Manager",
            self.ctx.llms.high.named("Manager"),
            tools,
            &self.ctx.work_dir,
            MANAGER_STEP_LIMIT,
        )
    }

    /// Project plan, asked from the human on first start.
    async fn project_plan(&self) -> anyhow::Result<String> {
        let path = self.dot.project_plan();
        if let Ok(plan) = tokio::fs::read_to_string(&path).await {
            return Ok(plan);
        }
        let plan = self.ctx.human.ask(PROJECT_PLAN_QUESTION).await?;
        tokio::fs::create_dir_all(self.dot.root()).await?;
        tokio::fs::write(&path, &plan).await?;
        Ok(plan)
    }

    async fn system_message(&self) -> anyhow::Result<ChatMessage> {
        let plan = self.project_plan().await?;
        Ok(ChatMessage::system(fill(
            MANAGER_SYSTEM,
            &[("project_plan", &plan), ("project_rules", &self.ctx.coderrules)],
        )))
    }

    /// Messages to start from: the checkpoint when one exists, a fresh
    /// conversation otherwise.
    pub async fn initial_messages(&self) -> anyhow::Result<Vec<ChatMessage>> {
        let mut messages = vec![self.system_message().await?];
        let progress = tasks_and_progress_message(&self.board, &self.dot).await?;

        match Checkpoint::new(self.dot.manager_messages()).load().await {
            Some(saved) => {
                tracing::info!(messages = saved.len(), "Continuing from checkpoint");
                messages.extend(saved);
                messages = replace_progress_message(messages, progress);
            }
            None => {
                messages.push(progress);
                messages.push(ChatMessage::user(self.ctx.dir_tree()));
            }
        }

        let tasks = self.board.tracker().get_tasks(self.board.project_id()).await?;
        if !tasks.is_empty() {
            let choice = self.ctx.human.choose("Choose an option:", &PLANNING_CHOICES).await?;
            if choice == 1 {
                messages.push(ChatMessage::user(EXECUTE_ONLY_MESSAGE));
            }
        }
        Ok(messages)
    }

    /// Plan and execute until the human closes the input or the step limit
    /// is reached.
    pub async fn run(&self) -> Result<GraphOutcome, GraphError> {
        println!("😀 Hello! I'm Manager agent. Let's plan your project together!");
        let messages = self
            .initial_messages()
            .await
            .map_err(super::graph::interrupted)?;
        let hooks = ManagerHooks {
            checkpoint: Checkpoint::new(self.dot.manager_messages()),
            board: self.board.clone(),
            dot: self.dot.clone(),
        };
        run_graph(&self.graph(), messages, &hooks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::testing::context;
    use crate::human::ScriptedInput;
    use crate::llm::testing::ScriptedLlm;
    use crate::tracker::{InMemoryTracker, NewTask};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        runs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskRunner for RecordingRunner {
        async fn run_task(&self, task_name_description: &str) -> anyhow::Result<()> {
            self.runs.lock().unwrap().push(task_name_description.to_string());
            Ok(())
        }

        async fn actualize_progress(&self, _task: &str, _tester_response: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connect_creates_project_when_none_exist() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = InMemoryTracker::new();
        let human = ScriptedInput::new(Vec::<String>::new());
        let id = connect_tracker_project(&tracker, &human, dir.path(), None)
            .await
            .unwrap();
        let projects = tracker.list_projects().await.unwrap();
        assert_eq!(projects[0].id, id);
        assert!(projects[0].name.starts_with("Clean_Coder_"));
        let env = std::fs::read_to_string(DotDir::new(dir.path()).env_file()).unwrap();
        assert_eq!(env, format!("TODOIST_PROJECT_ID={}\n", id));
    }

    #[tokio::test]
    async fn test_connect_uses_existing_project() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = InMemoryTracker::new();
        tracker.create_project("Website").await.unwrap();
        let shop = tracker.create_project("Shop").await.unwrap();
        let human = ScriptedInput::new(["2", "2"]);
        let id = connect_tracker_project(&tracker, &human, dir.path(), None)
            .await
            .unwrap();
        assert_eq!(id, shop.id);

        let configured = connect_tracker_project(&tracker, &human, dir.path(), Some("42"))
            .await
            .unwrap();
        assert_eq!(configured, "42");
    }

    #[test]
    fn test_replace_progress_message() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("tree"),
            ChatMessage::user(format!("{}\nold", TASKS_AND_PROGRESS_HEADER)),
        ];
        let out = replace_progress_message(
            messages,
            ChatMessage::user(format!("{}\nnew", TASKS_AND_PROGRESS_HEADER)),
        );
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].text_content(), Some("Tasks planned so far:\nnew"));
        assert_eq!(out[2].text_content(), Some("tree"));
    }

    async fn board_with_project() -> ProjectBoard {
        let tracker = Arc::new(InMemoryTracker::new());
        let project = tracker.create_project("Clean_Coder_app").await.unwrap();
        ProjectBoard::new(tracker, project.id)
    }

    #[tokio::test]
    async fn test_fresh_start_asks_for_project_plan() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new("high"));
        let human = Arc::new(ScriptedInput::new(["A todo app in Flask"]));
        let manager = Manager::with_runner(
            context(dir.path(), &llm, &human),
            board_with_project().await,
            Arc::new(RecordingRunner::default()),
        );

        let messages = manager.initial_messages().await.unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].text_content().unwrap().contains("A todo app in Flask"));
        assert!(is_progress_message(&messages[1]));
        assert!(messages[1].text_content().unwrap().contains("No tasks planned yet."));
        assert_eq!(
            std::fs::read_to_string(DotDir::new(dir.path()).project_plan()).unwrap(),
            "A todo app in Flask"
        );
    }

    #[tokio::test]
    async fn test_execute_only_mode_when_tasks_exist() {
        let dir = tempfile::tempdir().unwrap();
        let dot = DotDir::new(dir.path());
        std::fs::create_dir_all(dot.root()).unwrap();
        std::fs::write(dot.project_plan(), "plan").unwrap();
        let board = board_with_project().await;
        board
            .tracker()
            .add_task(
                board.project_id(),
                NewTask {
                    content: "Set up Flask".to_string(),
                    description: "app.py with hello route".to_string(),
                    order: 1,
                    section_id: None,
                },
            )
            .await
            .unwrap();
        let llm = Arc::new(ScriptedLlm::new("high"));
        let human = Arc::new(ScriptedInput::new(["2"]));
        let manager = Manager::with_runner(
            context(dir.path(), &llm, &human),
            board,
            Arc::new(RecordingRunner::default()),
        );

        let messages = manager.initial_messages().await.unwrap();
        assert_eq!(messages.last().unwrap().text_content(), Some(EXECUTE_ONLY_MESSAGE));
        assert!(messages[1].text_content().unwrap().contains("Set up Flask"));
    }

    #[tokio::test]
    async fn test_manager_plans_executes_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let dot = DotDir::new(dir.path());
        std::fs::create_dir_all(dot.root()).unwrap();
        std::fs::write(dot.project_plan(), "A todo app").unwrap();
        let board = board_with_project().await;
        let llm = Arc::new(ScriptedLlm::new("high"));
        llm.push_call(
            "add_task",
            r#"{"task_name": "Set up Flask", "task_description": "app.py with hello route", "order": 1}"#,
        );
        llm.push_call("finish_project_planning", "{}");
        let human = Arc::new(ScriptedInput::new(["ok", "ok", "works"]));
        let runner = Arc::new(RecordingRunner::default());
        let manager = Manager::with_runner(context(dir.path(), &llm, &human), board, runner.clone());

        let err = manager.run().await.unwrap_err();
        assert!(matches!(err, GraphError::Llm { .. }));
        assert_eq!(
            runner.runs.lock().unwrap().as_slice(),
            ["Set up Flask\napp.py with hello route"]
        );

        let requests = llm.requests();
        let after_add = requests[1][1].text_content().unwrap();
        assert!(after_add.starts_with(TASKS_AND_PROGRESS_HEADER));
        assert!(after_add.contains("Set up Flask"));

        let saved = Checkpoint::new(dot.manager_messages()).load().await.unwrap();
        assert!(is_progress_message(&saved[0]));
    }
}
