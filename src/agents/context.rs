//! Shared state handed to every agent of one pipeline run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::human::HumanInput;
use crate::ignore::CoderIgnore;
use crate::llm::LlmTiers;
use crate::rag::{
    file_descriptions_collection, BinaryRanker, Embedder, EmbeddingClient, ProjectIndex, Retriever,
    VectorCollection,
};
use crate::workdir::{list_directory_tree, read_coderrules, DotDir};

/// Everything the agents share.
///
/// Retrieval is optional: `retriever` and `index` are set only when an
/// embedding provider is configured and the project has been indexed.
#[derive(Clone)]
pub struct AgentContext {
    /// The project the agents work on.
    pub work_dir: PathBuf,

    pub llms: LlmTiers,

    pub human: Arc<dyn HumanInput>,

    /// Patterns from `.coderignore`, read once at start.
    pub ignore: Arc<CoderIgnore>,

    /// Content of `.coderrules`, empty when missing.
    pub coderrules: String,

    /// Frontend address; enables screenshots for the debugger.
    pub frontend_url: Option<String>,

    pub embedder: Option<Arc<dyn Embedder>>,

    pub retriever: Option<Arc<Retriever>>,

    pub index: Option<Arc<ProjectIndex>>,
}

impl AgentContext {
    pub fn new(work_dir: impl Into<PathBuf>, llms: LlmTiers, human: Arc<dyn HumanInput>) -> Self {
        let work_dir = work_dir.into();
        Self {
            ignore: Arc::new(CoderIgnore::load(&work_dir)),
            coderrules: read_coderrules(&work_dir),
            work_dir,
            llms,
            human,
            frontend_url: None,
            embedder: None,
            retriever: None,
            index: None,
        }
    }

    /// Context for `config`, with retrieval wired when the collection exists.
    pub async fn from_config(
        config: &Config,
        llms: LlmTiers,
        human: Arc<dyn HumanInput>,
    ) -> anyhow::Result<Self> {
        let mut ctx = Self::new(&config.work_dir, llms, human);
        ctx.frontend_url = config.frontend_url.clone();
        if let Some(client) = EmbeddingClient::from_keys(&config.providers, &config.embedding_model) {
            ctx.embedder = Some(Arc::new(client));
        }
        ctx.connect_retrieval().await?;
        Ok(ctx)
    }

    /// Open the description collection when it exists. Called again after
    /// indexing so a fresh index is picked up.
    pub async fn connect_retrieval(&mut self) -> anyhow::Result<()> {
        let Some(embedder) = self.embedder.clone() else {
            return Ok(());
        };
        let dot = DotDir::new(&self.work_dir);
        let name = file_descriptions_collection(&self.work_dir);
        if !VectorCollection::exists(&dot.vector_store(), &name) {
            tracing::debug!("No file description collection yet, retrieval disabled");
            return Ok(());
        }

        let index =
            ProjectIndex::for_work_dir(&self.work_dir, self.llms.mini.clone(), embedder).await?;
        let ranker = BinaryRanker::new(self.llms.mini.named("Binary ranker"));
        self.retriever = Some(Arc::new(Retriever::new(index.collection(), ranker)));
        self.index = Some(Arc::new(index));
        Ok(())
    }

    pub fn with_frontend_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_url = Some(url.into());
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Non-ignored directory tree of the project.
    pub fn dir_tree(&self) -> String {
        list_directory_tree(&self.work_dir, &self.ignore)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::human::ScriptedInput;
    use crate::llm::testing::ScriptedLlm;

    /// Context with every tier answered by `llm` and the human by `human`.
    pub fn context(work_dir: &Path, llm: &Arc<ScriptedLlm>, human: &Arc<ScriptedInput>) -> AgentContext {
        AgentContext::new(
            work_dir,
            LlmTiers::uniform(ScriptedLlm::chain(llm)),
            human.clone(),
        )
    }
}
