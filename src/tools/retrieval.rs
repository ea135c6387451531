use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{str_arg, Tool};
use crate::rag::Retriever;

/// Semantic search over the file descriptions collection.
pub struct RetrieveFilesBySemanticQuery {
    retriever: Arc<Retriever>,
}

impl RetrieveFilesBySemanticQuery {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RetrieveFilesBySemanticQuery {
    fn name(&self) -> &str {
        "retrieve_files_by_semantic_query"
    }

    fn description(&self) -> &str {
        "Use that function to find files or folders in the app by text search. \
You can search for example for common styles, endpoint with user data, etc. \
Useful, when you know what do you look for, but don't know where. \
Use that function at least once BEFORE calling final response to ensure you found all appropriate files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Semantic query describing subject you looking for in one sentence. Ask for a singular thing only. Explain here thing you look only: good query: <Common styles, used in app>; bad query: <Common styles for new endpoint>."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _working_dir: &Path) -> anyhow::Result<String> {
        let query = str_arg(&args, "query")?;
        let found = self.retriever.retrieve(query).await?;
        Ok(format!(
            "{}\n\nRemember to see files before adding to final response!",
            found
        ))
    }
}
