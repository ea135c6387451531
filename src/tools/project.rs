//! Project manager tools working on the task tracker.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{bool_arg, str_arg, usize_arg, Tool};
use crate::human::{is_approval, HumanInput};
use crate::tracker::{NewTask, TaskOrder, TaskTracker, TOOL_NOT_EXECUTED_WORD};

/// Executes one task picked by the manager and records the outcome.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task_name_description: &str) -> anyhow::Result<()>;

    async fn actualize_progress(
        &self,
        task_name_description: &str,
        tester_response: &str,
    ) -> anyhow::Result<()>;
}

/// Tracker bound to the connected project.
#[derive(Clone)]
pub struct ProjectBoard {
    tracker: Arc<dyn TaskTracker>,
    project_id: String,
}

impl ProjectBoard {
    pub fn new(tracker: Arc<dyn TaskTracker>, project_id: impl Into<String>) -> Self {
        Self {
            tracker,
            project_id: project_id.into(),
        }
    }

    pub fn tracker(&self) -> &Arc<dyn TaskTracker> {
        &self.tracker
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn missing_project(&self) -> anyhow::Error {
        anyhow::anyhow!(
            "Are you sure Todoist project (ID: {}) exists?",
            self.project_id
        )
    }
}

fn interrupted(answer: &str) -> String {
    format!(
        "{}Action wasn't executed because of human interruption. Human said: {}",
        TOOL_NOT_EXECUTED_WORD, answer
    )
}

fn optional_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args[name].as_str().filter(|s| !s.trim().is_empty())
}

// ============================================================================
// Tasks
// ============================================================================

pub struct AddTask {
    board: ProjectBoard,
    human: Arc<dyn HumanInput>,
}

impl AddTask {
    pub fn new(board: ProjectBoard, human: Arc<dyn HumanInput>) -> Self {
        Self { board, human }
    }
}

#[async_trait]
impl Tool for AddTask {
    fn name(&self) -> &str {
        "add_task"
    }

    fn description(&self) -> &str {
        "Add new task to Todoist.
Think very carefully before adding a new task to know what do you want exactly. Explain in detail what needs to be
done in order to execute task.
Avoid creating new tasks that have overlapping scope with old ones - modify or delete old tasks first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_name": {
                    "type": "string",
                    "description": "Name of the task. Good name is descriptive, starts with a verb and usually could be fitted in formula 'To complete this task, I need to $TASK_NAME'."
                },
                "task_description": {
                    "type": "string",
                    "description": "Detailed description of what needs to be done in order to implement task. Good description includes:\n- Definition of done (required) - section, describing what need to be done with acceptance criteria.\n- Resources (optional) - Include here all information that will be helpful for developer to complete task. Example code you found in internet, files dev need to use, technical details related to existing code programmer need to pay attention on."
                },
                "order": {
                    "type": "integer",
                    "description": "Order of the task in project."
                },
                "epic_id": {
                    "type": "string",
                    "description": "Id of the epic the task belongs to (optional)."
                }
            },
            "required": ["task_name", "task_description", "order"]
        })
    }

    async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let task_name = str_arg(&args, "task_name")?;
        let task_description = str_arg(&args, "task_description")?;
        let order = usize_arg(&args, "order")?;

        let answer = self
            .human
            .ask("Type (o)k to agree or provide commentary.")
            .await?;
        if !is_approval(&answer) {
            return Ok(interrupted(&answer));
        }

        let task = NewTask {
            content: task_name.to_string(),
            description: task_description.to_string(),
            order: order as i64,
            section_id: optional_str(&args, "epic_id").map(str::to_string),
        };
        self.board
            .tracker
            .add_task(&self.board.project_id, task)
            .await
            .map_err(|e| {
                tracing::error!("Adding task failed: {}", e);
                self.board.missing_project()
            })?;
        Ok("Task added successfully".to_string())
    }
}

pub struct ModifyTask {
    board: ProjectBoard,
    human: Arc<dyn HumanInput>,
}

impl ModifyTask {
    pub fn new(board: ProjectBoard, human: Arc<dyn HumanInput>) -> Self {
        Self { board, human }
    }
}

#[async_trait]
impl Tool for ModifyTask {
    fn name(&self) -> &str {
        "modify_task"
    }

    fn description(&self) -> &str {
        "Modify task in project management platform (Todoist)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {"type": "string", "description": "Id of the task."},
                "new_task_name": {"type": "string", "description": "New name of the task (optional)."},
                "new_task_description": {
                    "type": "string",
                    "description": "New detailed description of what needs to be done in order to implement task (optional)."
                },
                "epic_id": {"type": "string", "description": "Id of the epic to move the task into (optional)."},
                "delete": {"type": "boolean", "description": "If true, task will be deleted."}
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let task_id = str_arg(&args, "task_id")?;
        let delete = bool_arg(&args, "delete");

        let task = self.board.tracker.get_task(task_id).await.map_err(|e| {
            tracing::error!("Fetching task {} failed: {}", task_id, e);
            self.board.missing_project()
        })?;
        let action = if delete { "delete" } else { "modify" };
        let answer = self
            .human
            .ask(&format!(
                "I want to {} task '{}'. Type (o)k or provide commentary. ",
                action, task.content
            ))
            .await?;
        if !is_approval(&answer) {
            return Ok(interrupted(&answer));
        }

        let name = optional_str(&args, "new_task_name");
        let description = optional_str(&args, "new_task_description");
        if name.is_some() || description.is_some() {
            self.board
                .tracker
                .update_task(task_id, name, description)
                .await?;
        }
        if let Some(epic_id) = optional_str(&args, "epic_id") {
            self.board.tracker.move_task(task_id, epic_id).await?;
        }

        if delete {
            self.board.tracker.delete_task(task_id).await?;
            return Ok("Task deleted successfully".to_string());
        }
        Ok("Task modified successfully".to_string())
    }
}

pub struct ReorderTasks {
    board: ProjectBoard,
}

impl ReorderTasks {
    pub fn new(board: ProjectBoard) -> Self {
        Self { board }
    }
}

#[async_trait]
impl Tool for ReorderTasks {
    fn name(&self) -> &str {
        "reorder_tasks"
    }

    fn description(&self) -> &str {
        "Reorder tasks in project management platform (Todoist)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_items": {
                    "type": "array",
                    "description": "List of objects with 'id' (str) and 'child_order' (int) keys. Example: [{\"id\": \"123\", \"child_order\": 0}, {\"id\": \"456\", \"child_order\": 1}]",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "child_order": {"type": "integer"}
                        },
                        "required": ["id", "child_order"]
                    }
                }
            },
            "required": ["task_items"]
        })
    }

    async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let items: Vec<TaskOrder> = serde_json::from_value(args["task_items"].clone())
            .map_err(|e| anyhow::anyhow!("Invalid 'task_items' argument: {}", e))?;
        self.board.tracker.reorder_tasks(&items).await?;
        Ok("Tasks reordered successfully".to_string())
    }
}

// ============================================================================
// Epics
// ============================================================================

pub struct CreateEpic {
    board: ProjectBoard,
}

impl CreateEpic {
    pub fn new(board: ProjectBoard) -> Self {
        Self { board }
    }
}

#[async_trait]
impl Tool for CreateEpic {
    fn name(&self) -> &str {
        "create_epic"
    }

    fn description(&self) -> &str {
        "Create an epic to group tasks with similar scope."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Short description of functionality epic is about."}
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let name = str_arg(&args, "name")?;
        let epic = self
            .board
            .tracker
            .add_epic(&self.board.project_id, name)
            .await?;
        Ok(format!(
            "Epic '{}' (id: {}) created successfully",
            epic.name, epic.id
        ))
    }
}

pub struct ModifyEpic {
    board: ProjectBoard,
}

impl ModifyEpic {
    pub fn new(board: ProjectBoard) -> Self {
        Self { board }
    }
}

#[async_trait]
impl Tool for ModifyEpic {
    fn name(&self) -> &str {
        "modify_epic"
    }

    fn description(&self) -> &str {
        "Modify an epic in project management platform (Todoist)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "epic_id": {"type": "string", "description": "Id of the epic."},
                "new_epic_name": {"type": "string", "description": "New name of the epic (optional)."},
                "delete": {"type": "boolean", "description": "If true, epic will be deleted with all tasks inside."}
            },
            "required": ["epic_id"]
        })
    }

    async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let epic_id = str_arg(&args, "epic_id")?;
        if bool_arg(&args, "delete") {
            self.board.tracker.delete_epic(epic_id).await?;
            return Ok("Epic deleted successfully".to_string());
        }

        let Some(name) = optional_str(&args, "new_epic_name") else {
            return Ok("Provide 'new_epic_name' or set 'delete' to true.".to_string());
        };
        self.board.tracker.rename_epic(epic_id, name).await?;
        Ok("Epic modified successfully".to_string())
    }
}

// ============================================================================
// Execution
// ============================================================================

pub struct FinishProjectPlanning {
    board: ProjectBoard,
    human: Arc<dyn HumanInput>,
    runner: Arc<dyn TaskRunner>,
}

impl FinishProjectPlanning {
    pub fn new(board: ProjectBoard, human: Arc<dyn HumanInput>, runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            board,
            human,
            runner,
        }
    }
}

#[async_trait]
impl Tool for FinishProjectPlanning {
    fn name(&self) -> &str {
        "finish_project_planning"
    }

    fn description(&self) -> &str {
        "Call that tool to fire execution of top task from list. Use tool when all task in Todoist correctly reflect work. No extra tasks or tasks with
overlapping scope allowed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dummy": {"type": "string", "description": "Just write \"ok\"."}
            },
            "required": ["dummy"]
        })
    }

    async fn execute(&self, _args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let answer = self
            .human
            .ask("Project planning finished. Provide your proposition of changes in task list or type (o)k to continue...\n")
            .await?;
        if !is_approval(&answer) {
            return Ok(format!("{}{}", TOOL_NOT_EXECUTED_WORD, answer));
        }

        let tasks = self
            .board
            .tracker
            .get_tasks(&self.board.project_id)
            .await
            .map_err(|e| {
                tracing::error!("Fetching tasks failed: {}", e);
                self.board.missing_project()
            })?;
        let Some(task) = tasks.into_iter().next() else {
            return Ok(format!(
                "{}There are no tasks to execute. Plan tasks first.",
                TOOL_NOT_EXECUTED_WORD
            ));
        };
        let task_name_description = format!("{}\n{}", task.content, task.description);

        println!("\nAsked programmer to execute task: {}\n", task_name_description);
        self.runner.run_task(&task_name_description).await?;

        let tester_response = self
            .human
            .ask(&format!(
                "Please check if the task has been implemented correctly.\n\nTask: {}\n",
                task.content
            ))
            .await?;
        self.runner
            .actualize_progress(&task_name_description, &tester_response)
            .await?;

        self.board.tracker.close_task(&task.id).await?;
        tracing::info!(task = %task.id, "Task completed");
        Ok(format!(
            "Task '{}' executed and closed. Tester response: {}",
            task.content, tester_response
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::human::ScriptedInput;
    use crate::tracker::InMemoryTracker;
    use std::sync::Mutex;

    fn board(tracker: &Arc<InMemoryTracker>) -> ProjectBoard {
        ProjectBoard::new(tracker.clone(), "p1")
    }

    #[derive(Default)]
    struct RecordingRunner {
        runs: Mutex<Vec<String>>,
        progress: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl TaskRunner for RecordingRunner {
        async fn run_task(&self, task_name_description: &str) -> anyhow::Result<()> {
            self.runs.lock().unwrap().push(task_name_description.to_string());
            Ok(())
        }

        async fn actualize_progress(
            &self,
            task_name_description: &str,
            tester_response: &str,
        ) -> anyhow::Result<()> {
            self.progress
                .lock()
                .unwrap()
                .push((task_name_description.to_string(), tester_response.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_task_requires_approval() {
        let tracker = Arc::new(InMemoryTracker::new());
        let human = Arc::new(ScriptedInput::new(["split it in two", "ok"]));
        let tool = AddTask::new(board(&tracker), human);
        let args = json!({"task_name": "Add login", "task_description": "DoD: form works", "order": 0});

        let out = tool.execute(args.clone(), Path::new(".")).await.unwrap();
        assert!(out.starts_with(TOOL_NOT_EXECUTED_WORD));
        assert!(out.ends_with("split it in two"));
        assert!(tracker.get_tasks("p1").await.unwrap().is_empty());

        let out = tool.execute(args, Path::new(".")).await.unwrap();
        assert_eq!(out, "Task added successfully");
        let tasks = tracker.get_tasks("p1").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].content, "Add login");
    }

    #[tokio::test]
    async fn test_modify_and_delete_task() {
        let tracker = Arc::new(InMemoryTracker::new());
        let task = tracker
            .add_task(
                "p1",
                NewTask {
                    content: "Old".to_string(),
                    description: "d".to_string(),
                    order: 0,
                    section_id: None,
                },
            )
            .await
            .unwrap();
        let human = Arc::new(ScriptedInput::new(["o", "o"]));
        let tool = ModifyTask::new(board(&tracker), human.clone());

        let out = tool
            .execute(json!({"task_id": task.id, "new_task_name": "New"}), Path::new("."))
            .await
            .unwrap();
        assert_eq!(out, "Task modified successfully");
        assert_eq!(tracker.get_task(&task.id).await.unwrap().content, "New");
        assert!(human.prompts()[0].starts_with("I want to modify task 'Old'"));

        let out = tool
            .execute(json!({"task_id": task.id, "delete": true}), Path::new("."))
            .await
            .unwrap();
        assert_eq!(out, "Task deleted successfully");
        assert!(human.prompts()[1].starts_with("I want to delete task 'New'"));
        assert!(tracker.get_tasks("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_epics_and_reorder() {
        let tracker = Arc::new(InMemoryTracker::new());
        let out = CreateEpic::new(board(&tracker))
            .execute(json!({"name": "Auth"}), Path::new("."))
            .await
            .unwrap();
        assert!(out.starts_with("Epic 'Auth' (id: "));
        let epic = tracker.get_epics("p1").await.unwrap().remove(0);

        ModifyEpic::new(board(&tracker))
            .execute(json!({"epic_id": epic.id, "new_epic_name": "Accounts"}), Path::new("."))
            .await
            .unwrap();
        assert_eq!(tracker.get_epics("p1").await.unwrap()[0].name, "Accounts");

        let a = tracker
            .add_task("p1", NewTask { content: "a".into(), description: String::new(), order: 0, section_id: None })
            .await
            .unwrap();
        let b = tracker
            .add_task("p1", NewTask { content: "b".into(), description: String::new(), order: 1, section_id: None })
            .await
            .unwrap();
        let out = ReorderTasks::new(board(&tracker))
            .execute(
                json!({"task_items": [{"id": a.id, "child_order": 1}, {"id": b.id, "child_order": 0}]}),
                Path::new("."),
            )
            .await
            .unwrap();
        assert_eq!(out, "Tasks reordered successfully");
        assert_eq!(tracker.get_tasks("p1").await.unwrap()[0].content, "b");
    }

    #[tokio::test]
    async fn test_finish_project_planning_runs_top_task() {
        let tracker = Arc::new(InMemoryTracker::new());
        let task = tracker
            .add_task(
                "p1",
                NewTask {
                    content: "Add login".to_string(),
                    description: "DoD".to_string(),
                    order: 0,
                    section_id: None,
                },
            )
            .await
            .unwrap();
        let human = Arc::new(ScriptedInput::new(["ok", "works fine"]));
        let runner = Arc::new(RecordingRunner::default());
        let tool = FinishProjectPlanning::new(board(&tracker), human, runner.clone());

        let out = tool
            .execute(json!({"dummy": "ok"}), Path::new("."))
            .await
            .unwrap();
        assert!(out.contains("works fine"));
        assert_eq!(*runner.runs.lock().unwrap(), vec!["Add login\nDoD".to_string()]);
        assert_eq!(
            runner.progress.lock().unwrap()[0],
            ("Add login\nDoD".to_string(), "works fine".to_string())
        );
        assert_eq!(tracker.closed(), vec![task.id]);
    }

    #[tokio::test]
    async fn test_finish_project_planning_rejected() {
        let tracker = Arc::new(InMemoryTracker::new());
        let human = Arc::new(ScriptedInput::new(["add a task for tests first"]));
        let runner = Arc::new(RecordingRunner::default());
        let tool = FinishProjectPlanning::new(board(&tracker), human, runner.clone());
        let out = tool.execute(json!({"dummy": "ok"}), Path::new(".")).await.unwrap();
        assert_eq!(out, format!("{}add a task for tests first", TOOL_NOT_EXECUTED_WORD));
        assert!(runner.runs.lock().unwrap().is_empty());
    }
}
