use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{str_arg, Tool};
use crate::human::HumanInput;

/// Hand a question or a manual step over to the human.
pub struct AskHuman {
    human: Arc<dyn HumanInput>,
}

impl AskHuman {
    pub fn new(human: Arc<dyn HumanInput>) -> Self {
        Self { human }
    }
}

#[async_trait]
impl Tool for AskHuman {
    fn name(&self) -> &str {
        "ask_human_tool"
    }

    fn description(&self) -> &str {
        "Ask human to do project setup/debug actions you're not available to do or provide observations of how does program works."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Prompt you want to show to human."
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let prompt = str_arg(&args, "prompt")?;
        self.human.ask(prompt).await
    }
}
