//! Declarative "final answer" tools.
//!
//! These are advertised to the model like any other tool but never run:
//! the graph router recognises the call and ends the agent loop with its
//! arguments.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;

pub struct FinalResponse {
    name: String,
    description: String,
    schema: Value,
}

impl FinalResponse {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    /// Files and template images chosen by the researcher.
    pub fn researcher() -> Self {
        Self::new(
            "final_response_researcher",
            "That tool outputs list of files programmer will need to change and paths to graphical patterns if some.\nUse that tool only when you 100% sure you found all the files programmer will need to modify.\nIf not, do additional research. Include only the files you convinced will be useful.",
            json!({
                "type": "object",
                "properties": {
                    "reasoning": {
                        "type": "string",
                        "description": "Reasoning what files will be needed."
                    },
                    "files_for_executor": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of files programmer will need to change or take a look at."
                    },
                    "template_images": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of image paths that be used as graphical patterns. Empty if none."
                    }
                },
                "required": ["reasoning", "files_for_executor"]
            }),
        )
    }

    pub fn executor() -> Self {
        Self::new(
            "final_response_executor",
            "Call that tool when all plan steps are implemented to finish your job.",
            test_instruction_schema(),
        )
    }

    pub fn debugger() -> Self {
        Self::new(
            "final_response_debugger",
            "Call that tool when all changes are implemented to tell the job is done.",
            test_instruction_schema(),
        )
    }
}

fn test_instruction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "test_instruction": {
                "type": "string",
                "description": "Detailed instructions for human to test implemented changes."
            }
        },
        "required": ["test_instruction"]
    })
}

#[async_trait]
impl Tool for FinalResponse {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, _args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        Ok(format!("{} is handled by the agent loop.", self.name))
    }
}
