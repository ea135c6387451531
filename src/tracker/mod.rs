//! Task tracker used by the project manager.
//!
//! Tasks are grouped into epics (Todoist sections). The manager only ever
//! talks to [`TaskTracker`]; [`TodoistClient`] is the production backend.

mod todoist;

pub use todoist::TodoistClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Prefix of tool results for actions the human stopped.
pub const TOOL_NOT_EXECUTED_WORD: &str = "Tool not been executed. ";

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Todoist request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Todoist returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse Todoist response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub section_id: Option<String>,
}

/// A group of tasks with similar scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Epic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub content: String,
    pub description: String,
    pub order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

/// New position of one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOrder {
    pub id: String,
    pub child_order: i64,
}

#[async_trait]
pub trait TaskTracker: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, TrackerError>;

    async fn create_project(&self, name: &str) -> Result<Project, TrackerError>;

    async fn get_tasks(&self, project_id: &str) -> Result<Vec<Task>, TrackerError>;

    async fn get_task(&self, task_id: &str) -> Result<Task, TrackerError>;

    async fn add_task(&self, project_id: &str, task: NewTask) -> Result<Task, TrackerError>;

    /// Change name and/or description; `None` keeps the current value.
    async fn update_task(
        &self,
        task_id: &str,
        content: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), TrackerError>;

    async fn delete_task(&self, task_id: &str) -> Result<(), TrackerError>;

    async fn close_task(&self, task_id: &str) -> Result<(), TrackerError>;

    async fn reorder_tasks(&self, items: &[TaskOrder]) -> Result<(), TrackerError>;

    async fn move_task(&self, task_id: &str, epic_id: &str) -> Result<(), TrackerError>;

    async fn get_epics(&self, project_id: &str) -> Result<Vec<Epic>, TrackerError>;

    async fn add_epic(&self, project_id: &str, name: &str) -> Result<Epic, TrackerError>;

    async fn rename_epic(&self, epic_id: &str, name: &str) -> Result<(), TrackerError>;

    /// Deletes the epic together with its tasks.
    async fn delete_epic(&self, epic_id: &str) -> Result<(), TrackerError>;
}

fn format_task(task: &Task) -> String {
    format!(
        "Task:\nid: {}, \nName: {}, \nDescription: \n'''{}''', \nOrder: {}\n\n",
        task.id, task.content, task.description, task.order
    )
}

/// Tasks grouped by epic, as shown to the manager.
pub fn format_tasks_and_epics(epics: &[Epic], tasks: &[Task]) -> String {
    if tasks.is_empty() && epics.is_empty() {
        return "No tasks planned yet.\n\n".to_string();
    }

    let mut out = String::new();
    for epic in epics {
        out.push_str(&format!("## Epic: {} (id: {})\n\n", epic.name, epic.id));
        let in_epic: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.section_id.as_deref() == Some(epic.id.as_str()))
            .collect();
        if in_epic.is_empty() {
            out.push_str(&format!("No tasks in epic '{}'\n\n", epic.name));
        } else {
            for task in in_epic {
                out.push_str(&format_task(task));
            }
        }
    }

    let known_epic = |t: &&Task| {
        t.section_id
            .as_deref()
            .map(|id| epics.iter().any(|e| e.id == id))
            .unwrap_or(false)
    };
    let loose: Vec<&Task> = tasks.iter().filter(|t| !known_epic(t)).collect();
    if !loose.is_empty() {
        if !epics.is_empty() {
            out.push_str("## Tasks without epic:\n\n");
        }
        for task in loose {
            out.push_str(&format_task(task));
        }
    }
    out
}

/// Tasks in execution order.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| t.order);
}

#[cfg(test)]
pub use in_memory::InMemoryTracker;

#[cfg(test)]
mod in_memory {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct State {
        next_id: u64,
        projects: Vec<Project>,
        tasks: Vec<(String, Task)>,
        epics: Vec<(String, Epic)>,
        closed: Vec<String>,
    }

    /// Tracker kept in memory for tests.
    #[derive(Default)]
    pub struct InMemoryTracker {
        state: Mutex<State>,
    }

    impl InMemoryTracker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn closed(&self) -> Vec<String> {
            self.state.lock().unwrap().closed.clone()
        }

        fn next_id(state: &mut State) -> String {
            state.next_id += 1;
            state.next_id.to_string()
        }
    }

    #[async_trait]
    impl TaskTracker for InMemoryTracker {
        async fn list_projects(&self) -> Result<Vec<Project>, TrackerError> {
            Ok(self.state.lock().unwrap().projects.clone())
        }

        async fn create_project(&self, name: &str) -> Result<Project, TrackerError> {
            let mut state = self.state.lock().unwrap();
            let project = Project {
                id: Self::next_id(&mut state),
                name: name.to_string(),
            };
            state.projects.push(project.clone());
            Ok(project)
        }

        async fn get_tasks(&self, project_id: &str) -> Result<Vec<Task>, TrackerError> {
            let state = self.state.lock().unwrap();
            let mut tasks: Vec<Task> = state
                .tasks
                .iter()
                .filter(|(p, _)| p == project_id)
                .map(|(_, t)| t.clone())
                .collect();
            sort_tasks(&mut tasks);
            Ok(tasks)
        }

        async fn get_task(&self, task_id: &str) -> Result<Task, TrackerError> {
            let state = self.state.lock().unwrap();
            state
                .tasks
                .iter()
                .find(|(_, t)| t.id == task_id)
                .map(|(_, t)| t.clone())
                .ok_or_else(|| TrackerError::NotFound(format!("Task {}", task_id)))
        }

        async fn add_task(&self, project_id: &str, task: NewTask) -> Result<Task, TrackerError> {
            let mut state = self.state.lock().unwrap();
            let task = Task {
                id: Self::next_id(&mut state),
                content: task.content,
                description: task.description,
                order: task.order,
                section_id: task.section_id,
            };
            state.tasks.push((project_id.to_string(), task.clone()));
            Ok(task)
        }

        async fn update_task(
            &self,
            task_id: &str,
            content: Option<&str>,
            description: Option<&str>,
        ) -> Result<(), TrackerError> {
            let mut state = self.state.lock().unwrap();
            let (_, task) = state
                .tasks
                .iter_mut()
                .find(|(_, t)| t.id == task_id)
                .ok_or_else(|| TrackerError::NotFound(format!("Task {}", task_id)))?;
            if let Some(content) = content {
                task.content = content.to_string();
            }
            if let Some(description) = description {
                task.description = description.to_string();
            }
            Ok(())
        }

        async fn delete_task(&self, task_id: &str) -> Result<(), TrackerError> {
            self.state.lock().unwrap().tasks.retain(|(_, t)| t.id != task_id);
            Ok(())
        }

        async fn close_task(&self, task_id: &str) -> Result<(), TrackerError> {
            let mut state = self.state.lock().unwrap();
            state.tasks.retain(|(_, t)| t.id != task_id);
            state.closed.push(task_id.to_string());
            Ok(())
        }

        async fn reorder_tasks(&self, items: &[TaskOrder]) -> Result<(), TrackerError> {
            let mut state = self.state.lock().unwrap();
            for item in items {
                if let Some((_, task)) = state.tasks.iter_mut().find(|(_, t)| t.id == item.id) {
                    task.order = item.child_order;
                }
            }
            Ok(())
        }

        async fn move_task(&self, task_id: &str, epic_id: &str) -> Result<(), TrackerError> {
            let mut state = self.state.lock().unwrap();
            if let Some((_, task)) = state.tasks.iter_mut().find(|(_, t)| t.id == task_id) {
                task.section_id = Some(epic_id.to_string());
            }
            Ok(())
        }

        async fn get_epics(&self, project_id: &str) -> Result<Vec<Epic>, TrackerError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .epics
                .iter()
                .filter(|(p, _)| p == project_id)
                .map(|(_, e)| e.clone())
                .collect())
        }

        async fn add_epic(&self, project_id: &str, name: &str) -> Result<Epic, TrackerError> {
            let mut state = self.state.lock().unwrap();
            let epic = Epic {
                id: Self::next_id(&mut state),
                name: name.to_string(),
                order: state.epics.len() as i64,
            };
            state.epics.push((project_id.to_string(), epic.clone()));
            Ok(epic)
        }

        async fn rename_epic(&self, epic_id: &str, name: &str) -> Result<(), TrackerError> {
            let mut state = self.state.lock().unwrap();
            if let Some((_, epic)) = state.epics.iter_mut().find(|(_, e)| e.id == epic_id) {
                epic.name = name.to_string();
            }
            Ok(())
        }

        async fn delete_epic(&self, epic_id: &str) -> Result<(), TrackerError> {
            let mut state = self.state.lock().unwrap();
            state.epics.retain(|(_, e)| e.id != epic_id);
            state
                .tasks
                .retain(|(_, t)| t.section_id.as_deref() != Some(epic_id));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, content: &str, order: i64, section: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            content: content.to_string(),
            description: format!("do {}", content),
            order,
            section_id: section.map(str::to_string),
        }
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_tasks_and_epics(&[], &[]), "No tasks planned yet.\n\n");
    }

    #[test]
    fn test_format_without_epics() {
        let out = format_tasks_and_epics(&[], &[task("7", "Add login", 1, None)]);
        assert_eq!(
            out,
            "Task:\nid: 7, \nName: Add login, \nDescription: \n'''do Add login''', \nOrder: 1\n\n"
        );
    }

    #[test]
    fn test_format_groups_by_epic() {
        let epics = vec![
            Epic {
                id: "e1".to_string(),
                name: "Auth".to_string(),
                order: 0,
            },
            Epic {
                id: "e2".to_string(),
                name: "Billing".to_string(),
                order: 1,
            },
        ];
        let tasks = vec![task("1", "Add login", 0, Some("e1")), task("2", "Readme", 1, None)];
        let out = format_tasks_and_epics(&epics, &tasks);
        assert!(out.starts_with("## Epic: Auth (id: e1)\n\nTask:\nid: 1"));
        assert!(out.contains("No tasks in epic 'Billing'"));
        assert!(out.contains("## Tasks without epic:\n\nTask:\nid: 2"));
    }

    #[tokio::test]
    async fn test_in_memory_tracker_orders_and_closes() {
        let tracker = InMemoryTracker::new();
        let project = tracker.create_project("Clean_Coder_app").await.unwrap();
        let a = tracker
            .add_task(
                &project.id,
                NewTask {
                    content: "a".to_string(),
                    description: String::new(),
                    order: 0,
                    section_id: None,
                },
            )
            .await
            .unwrap();
        let b = tracker
            .add_task(
                &project.id,
                NewTask {
                    content: "b".to_string(),
                    description: String::new(),
                    order: 1,
                    section_id: None,
                },
            )
            .await
            .unwrap();
        tracker
            .reorder_tasks(&[
                TaskOrder {
                    id: a.id.clone(),
                    child_order: 1,
                },
                TaskOrder {
                    id: b.id.clone(),
                    child_order: 0,
                },
            ])
            .await
            .unwrap();
        let tasks = tracker.get_tasks(&project.id).await.unwrap();
        assert_eq!(tasks[0].id, b.id);

        tracker.close_task(&b.id).await.unwrap();
        assert_eq!(tracker.closed(), vec![b.id]);
        assert_eq!(tracker.get_tasks(&project.id).await.unwrap().len(), 1);
    }
}
