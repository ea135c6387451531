//! Todoist client for the REST v2 and Sync v9 APIs.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{Epic, NewTask, Project, Task, TaskOrder, TaskTracker, TrackerError};

const REST_URL: &str = "https://api.todoist.com/rest/v2";
const SYNC_URL: &str = "https://api.todoist.com/sync/v9/sync";

/// Todoist backend. Reordering and moving tasks go through the Sync API.
pub struct TodoistClient {
    client: Client,
    api_key: String,
    rest_url: String,
    sync_url: String,
}

/// One Sync API command, serialised as the `commands` form field.
pub(crate) fn sync_command(command_type: &str, args: Value) -> Value {
    json!([{
        "type": command_type,
        "uuid": uuid::Uuid::new_v4().to_string(),
        "args": args,
    }])
}

impl TodoistClient {
    /// Create a new Todoist client.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            rest_url: REST_URL.to_string(),
            sync_url: SYNC_URL.to_string(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(std::time::Duration::from_secs(30))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, TrackerError> {
        let resp = self.authorized(builder).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::error!("Todoist API error: {} - {}", status, text);
            return Err(TrackerError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, TrackerError> {
        let text = self.send(builder).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn sync(&self, command_type: &str, args: Value) -> Result<(), TrackerError> {
        let commands = sync_command(command_type, args).to_string();
        let text = self
            .send(self.client.post(&self.sync_url).form(&[("commands", commands)]))
            .await?;
        tracing::debug!("Todoist sync {}: {}", command_type, text);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.rest_url, path)
    }
}

#[async_trait]
impl TaskTracker for TodoistClient {
    // ==================== Projects ====================

    async fn list_projects(&self) -> Result<Vec<Project>, TrackerError> {
        self.send_json(self.client.get(self.url("projects"))).await
    }

    async fn create_project(&self, name: &str) -> Result<Project, TrackerError> {
        self.send_json(self.client.post(self.url("projects")).json(&json!({ "name": name })))
            .await
    }

    // ==================== Tasks ====================

    async fn get_tasks(&self, project_id: &str) -> Result<Vec<Task>, TrackerError> {
        let mut tasks: Vec<Task> = self
            .send_json(
                self.client
                    .get(self.url("tasks"))
                    .query(&[("project_id", project_id)]),
            )
            .await?;
        super::sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, TrackerError> {
        match self
            .send_json(self.client.get(self.url(&format!("tasks/{}", task_id))))
            .await
        {
            Err(TrackerError::Status { status: 404, .. }) => {
                Err(TrackerError::NotFound(format!("Task {}", task_id)))
            }
            other => other,
        }
    }

    async fn add_task(&self, project_id: &str, task: NewTask) -> Result<Task, TrackerError> {
        let mut body = serde_json::to_value(&task)?;
        body["project_id"] = json!(project_id);
        self.send_json(self.client.post(self.url("tasks")).json(&body))
            .await
    }

    async fn update_task(
        &self,
        task_id: &str,
        content: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), TrackerError> {
        let mut body = serde_json::Map::new();
        if let Some(content) = content {
            body.insert("content".to_string(), json!(content));
        }
        if let Some(description) = description {
            body.insert("description".to_string(), json!(description));
        }
        if body.is_empty() {
            return Ok(());
        }
        self.send(
            self.client
                .post(self.url(&format!("tasks/{}", task_id)))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), TrackerError> {
        self.send(self.client.delete(self.url(&format!("tasks/{}", task_id))))
            .await?;
        Ok(())
    }

    async fn close_task(&self, task_id: &str) -> Result<(), TrackerError> {
        self.send(self.client.post(self.url(&format!("tasks/{}/close", task_id))))
            .await?;
        Ok(())
    }

    async fn reorder_tasks(&self, items: &[TaskOrder]) -> Result<(), TrackerError> {
        self.sync("item_reorder", json!({ "items": items })).await
    }

    async fn move_task(&self, task_id: &str, epic_id: &str) -> Result<(), TrackerError> {
        self.sync("item_move", json!({ "id": task_id, "section_id": epic_id }))
            .await
    }

    // ==================== Epics (sections) ====================

    async fn get_epics(&self, project_id: &str) -> Result<Vec<Epic>, TrackerError> {
        self.send_json(
            self.client
                .get(self.url("sections"))
                .query(&[("project_id", project_id)]),
        )
        .await
    }

    async fn add_epic(&self, project_id: &str, name: &str) -> Result<Epic, TrackerError> {
        self.send_json(
            self.client
                .post(self.url("sections"))
                .json(&json!({ "name": name, "project_id": project_id })),
        )
        .await
    }

    async fn rename_epic(&self, epic_id: &str, name: &str) -> Result<(), TrackerError> {
        self.send(
            self.client
                .post(self.url(&format!("sections/{}", epic_id)))
                .json(&json!({ "name": name })),
        )
        .await?;
        Ok(())
    }

    async fn delete_epic(&self, epic_id: &str) -> Result<(), TrackerError> {
        self.send(self.client.delete(self.url(&format!("sections/{}", epic_id))))
            .await?;
        Ok(())
    }
}
