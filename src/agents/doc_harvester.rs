//! Documentation of the Python libraries a task needs.
//!
//! Library sources are located in the local Python installation, described
//! like project files and indexed into their own collection. The planner
//! gets the descriptions relevant to the task.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use super::AgentContext;
use crate::ignore::CoderIgnore;
use crate::llm::{structured_tool, ChatMessage};
use crate::prompts::{fill, DOC_HARVESTER_LIBRARIES};
use crate::rag::{
    collect_file_paths, lib_documentation_collection, upload_descriptions_to_vdb, BinaryRanker,
    Describer, Retriever, VectorCollection, NO_RELEVANT_DOCUMENTS,
};
use crate::workdir::DotDir;

/// Described files per library; big packages are cut here.
const MAX_FILES_PER_LIBRARY: usize = 200;

const LOCATE_SCRIPT: &str =
    "import importlib, os, sys; print(os.path.dirname(importlib.import_module(sys.argv[1]).__file__))";

#[derive(Debug, Deserialize)]
struct PythonLibraries {
    #[serde(default)]
    libraries: Vec<String>,
}

fn is_import_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

pub struct DocHarvester {
    ctx: AgentContext,
    python: String,
}

impl DocHarvester {
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            python: "python3".to_string(),
        }
    }

    /// Interpreter used to locate libraries.
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    /// Import names of libraries useful for `task`.
    pub async fn identify_libraries(&self, task: &str) -> anyhow::Result<Vec<String>> {
        let tool = structured_tool(
            "python_libraries",
            "Identify python libraries which are relevant to the user's task.",
            json!({
                "type": "object",
                "properties": {
                    "libraries": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "The list of libraries."
                    }
                },
                "required": ["libraries"]
            }),
        );
        let prompt = fill(DOC_HARVESTER_LIBRARIES, &[("task", task)]);
        let response: PythonLibraries = self
            .ctx
            .llms
            .mini
            .named("DocHarvester")
            .invoke_structured(&[ChatMessage::user(prompt)], &tool)
            .await?;
        Ok(response
            .libraries
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| is_import_name(l))
            .collect())
    }

    /// Source directory of an installed library; `None` when not installed.
    pub async fn locate_library(&self, library: &str) -> Option<PathBuf> {
        let output = Command::new(&self.python)
            .arg("-c")
            .arg(LOCATE_SCRIPT)
            .arg(library)
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => {
                let dir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
                dir.is_dir().then_some(dir)
            }
            Ok(output) => {
                tracing::warn!(
                    "Library {} not found: {}",
                    library,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                tracing::warn!("Could not run {}: {}", self.python, e);
                None
            }
        }
    }

    async fn collection(&self) -> anyhow::Result<Option<Arc<VectorCollection>>> {
        let Some(embedder) = self.ctx.embedder.clone() else {
            return Ok(None);
        };
        let dot = DotDir::new(&self.ctx.work_dir);
        let collection = VectorCollection::get_or_create(
            &dot.vector_store(),
            &lib_documentation_collection(&self.ctx.work_dir),
            embedder,
        )
        .await?;
        Ok(Some(Arc::new(collection)))
    }

    /// Describe the sources of `libraries` (name, source dir) and upload the
    /// descriptions.
    pub async fn index_documentation(
        &self,
        libraries: &[(String, PathBuf)],
        collection: &VectorCollection,
    ) -> anyhow::Result<usize> {
        let descriptions_dir = DotDir::new(&self.ctx.work_dir).lib_descriptions();
        for (name, source_dir) in libraries {
            let Some(parent) = source_dir.parent() else {
                continue;
            };
            let dir_name = source_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| name.clone());
            let ignore = CoderIgnore::from_patterns(source_dir, vec!["__pycache__".to_string()]);
            let mut files: Vec<String> = collect_file_paths(source_dir, &ignore)
                .into_iter()
                .map(|f| format!("{}/{}", dir_name, f))
                .collect();
            if files.len() > MAX_FILES_PER_LIBRARY {
                tracing::warn!(
                    "{} has {} files, describing the first {}",
                    name,
                    files.len(),
                    MAX_FILES_PER_LIBRARY
                );
                files.truncate(MAX_FILES_PER_LIBRARY);
            }

            let describer = Describer::new(
                self.ctx.llms.mini.named("DocHarvester describer"),
                parent,
                &descriptions_dir,
                "",
            );
            let written = describer.write_file_descriptions(&files).await?;
            tracing::info!(library = %name, "Described {} files", written);
        }
        upload_descriptions_to_vdb(&descriptions_dir, collection).await
    }

    /// Documentation relevant to `task`, or `None` when nothing was found.
    pub async fn find_documentation(&self, task: &str) -> anyhow::Result<Option<String>> {
        println!("📚 Doc harvester here! Looking for documentation of libraries you use.");
        let Some(collection) = self.collection().await? else {
            tracing::warn!("No embedding provider configured, skipping documentation");
            return Ok(None);
        };

        let libraries = self.identify_libraries(task).await?;
        let mut located = Vec::new();
        for library in libraries {
            if let Some(dir) = self.locate_library(&library).await {
                located.push((library, dir));
            }
        }
        if located.is_empty() {
            return Ok(None);
        }
        self.index_documentation(&located, &collection).await?;

        let ranker = BinaryRanker::new(self.ctx.llms.mini.named("Binary ranker"));
        let documentation = Retriever::new(collection, ranker).retrieve(task).await?;
        if documentation == NO_RELEVANT_DOCUMENTS {
            Ok(None)
        } else {
            Ok(Some(documentation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::testing::context;
    use crate::human::ScriptedInput;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::ChatResponse;
    use crate::rag::embed::WordHashEmbedder;
    use std::path::Path;

    fn harvester_llm() -> Arc<ScriptedLlm> {
        Arc::new(ScriptedLlm::new("mini").with_responder(|messages| {
            let prompt = messages.last().and_then(|m| m.text_content()).unwrap_or_default();
            if prompt.contains("List the Python libraries") {
                ScriptedLlm::call_response("python_libraries", r#"{"libraries": ["fastlib", "bad name!"]}"#)
            } else if prompt.contains("Decide whether the document") {
                let relevant = prompt.contains("Filename: fastlib/client.py");
                ScriptedLlm::call_response(
                    "binary_ranking_result",
                    &json!({"reasoning": "r", "is_relevant": relevant}).to_string(),
                )
            } else {
                let text = if prompt.contains("def get") {
                    "HTTP client with a get function"
                } else {
                    "Package init"
                };
                ChatResponse {
                    content: Some(text.to_string()),
                    ..Default::default()
                }
            }
        }))
    }

    fn fake_library(site: &Path) -> PathBuf {
        let lib = site.join("fastlib");
        std::fs::create_dir_all(lib.join("__pycache__")).unwrap();
        std::fs::write(lib.join("__init__.py"), "from .client import get\n").unwrap();
        std::fs::write(lib.join("client.py"), "def get(url):\n    return url\n").unwrap();
        std::fs::write(lib.join("__pycache__/client.py"), "stale").unwrap();
        lib
    }

    #[tokio::test]
    async fn test_identify_libraries_drops_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        let llm = harvester_llm();
        let human = Arc::new(ScriptedInput::new(Vec::<String>::new()));
        let harvester = DocHarvester::new(context(dir.path(), &llm, &human));
        assert_eq!(harvester.identify_libraries("scrape").await.unwrap(), vec!["fastlib"]);
    }

    #[tokio::test]
    async fn test_index_and_retrieve_documentation() {
        let work = tempfile::tempdir().unwrap();
        let site = tempfile::tempdir().unwrap();
        let lib = fake_library(site.path());
        let llm = harvester_llm();
        let human = Arc::new(ScriptedInput::new(Vec::<String>::new()));
        let mut ctx = context(work.path(), &llm, &human);
        ctx.embedder = Some(Arc::new(WordHashEmbedder));
        let harvester = DocHarvester::new(ctx);

        let collection = harvester.collection().await.unwrap().unwrap();
        let uploaded = harvester
            .index_documentation(&[("fastlib".to_string(), lib)], &collection)
            .await
            .unwrap();
        assert_eq!(uploaded, 2);

        let ranker = BinaryRanker::new(ScriptedLlm::chain(&llm));
        let docs = Retriever::new(collection, ranker).retrieve("http get").await.unwrap();
        assert_eq!(docs, "fastlib/client.py:\n\nHTTP client with a get function\n\n###\n\n");
    }

    #[tokio::test]
    async fn test_find_documentation_without_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let llm = harvester_llm();
        let human = Arc::new(ScriptedInput::new(Vec::<String>::new()));
        let harvester = DocHarvester::new(context(dir.path(), &llm, &human));
        assert!(harvester.find_documentation("scrape").await.unwrap().is_none());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_interpreter_locates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let llm = harvester_llm();
        let human = Arc::new(ScriptedInput::new(Vec::<String>::new()));
        let harvester =
            DocHarvester::new(context(dir.path(), &llm, &human)).with_python("no-such-python-xyz");
        assert!(harvester.locate_library("fastlib").await.is_none());
    }
}
