//! Tool system for the agents.
//!
//! Tools are the "hands and eyes" of the agents. Every path a model passes
//! in is relative to the working directory (a leading `/` means the project
//! root) and is checked against `.coderignore` before anything is read or
//! written.
//!
//! Tool failures are returned as text so the model can react to them; only
//! infrastructure failures (the human closing the console, tracker HTTP
//! errors) surface as `Err`.

mod ask_human;
mod edit;
mod files;
mod final_response;
mod project;
mod retrieval;

pub use ask_human::AskHuman;
pub use edit::{CreateFileWithCode, InsertCode, ReplaceCode, APPROVAL_PROMPT};
pub use files::{ListDir, SeeFile};
pub use final_response::FinalResponse;
pub use project::{
    AddTask, CreateEpic, FinishProjectPlanning, ModifyEpic, ModifyTask, ProjectBoard, ReorderTasks,
    TaskRunner,
};
pub use retrieval::RetrieveFilesBySemanticQuery;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionDefinition, ToolDefinition};

// ============================================================================
// Argument helpers
// ============================================================================

/// Required string argument.
pub(crate) fn str_arg<'a>(args: &'a Value, name: &str) -> anyhow::Result<&'a str> {
    args[name]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", name))
}

/// Required integer argument; numeric strings are accepted too.
pub(crate) fn usize_arg(args: &Value, name: &str) -> anyhow::Result<usize> {
    match &args[name] {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| anyhow::anyhow!("'{}' must be a non-negative integer", name)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("'{}' must be a non-negative integer", name)),
        _ => Err(anyhow::anyhow!("Missing '{}' argument", name)),
    }
}

/// Optional boolean argument; `"true"`/`"True"` strings are accepted too.
pub(crate) fn bool_arg(args: &Value, name: &str) -> bool {
    match &args[name] {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

// ============================================================================
// Tool Trait and Registry
// ============================================================================

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// The `working_dir` is the project all paths are relative to.
    async fn execute(&self, args: Value, working_dir: &Path) -> anyhow::Result<String>;
}

/// Definition handed to the LLM for `tool`.
pub fn tool_definition(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        },
    }
}

/// Registry of the tools one agent may call.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get tool schemas in LLM-compatible format, sorted by name.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        let mut schemas: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| tool_definition(t.as_ref()))
            .collect();
        schemas.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        schemas
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        working_dir: &Path,
    ) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args, working_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echo"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
            Ok(str_arg(&args, "text")?.to_string())
        }
    }

    #[tokio::test]
    async fn test_registry_executes_and_rejects_unknown() {
        let registry = ToolRegistry::empty()
            .with(Arc::new(Echo("b_echo")))
            .with(Arc::new(Echo("a_echo")));
        let out = registry
            .execute("a_echo", json!({"text": "hi"}), Path::new("."))
            .await
            .unwrap();
        assert_eq!(out, "hi");

        let err = registry
            .execute("missing", json!({}), Path::new("."))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: missing");

        let names: Vec<String> = registry
            .get_tool_schemas()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["a_echo", "b_echo"]);
    }

    #[test]
    fn test_argument_helpers() {
        let args = json!({"n": 3, "s": "7", "b": "True", "neg": -1});
        assert_eq!(usize_arg(&args, "n").unwrap(), 3);
        assert_eq!(usize_arg(&args, "s").unwrap(), 7);
        assert!(usize_arg(&args, "neg").is_err());
        assert!(usize_arg(&args, "missing").is_err());
        assert!(bool_arg(&args, "b"));
        assert!(!bool_arg(&args, "missing"));
    }
}
