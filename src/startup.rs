//! Startup shared by the binaries.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::agents::AgentContext;
use crate::config::Config;
use crate::human::{ConsoleInput, HumanInput};
use crate::llm::LlmTiers;
use crate::rag::prompt_index_project_files;
use crate::util::telemetry_event;
use crate::workdir::set_up_dot_clean_coder_dir;

/// Logs go to stderr so they do not mix with the conversation on stdout.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "clean_coder=debug"
    } else {
        "clean_coder=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load `.env`, then the configuration from the environment.
pub fn load_config() -> anyhow::Result<Config> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }
    Ok(Config::from_env()?)
}

/// Prepare `.clean_coder`, offer indexing and build the agent context.
pub async fn prepare_context(
    config: &Config,
    skip_index: bool,
    event: &str,
) -> anyhow::Result<AgentContext> {
    set_up_dot_clean_coder_dir(&config.work_dir)?;
    let llms = LlmTiers::from_config(config)?;
    let human: Arc<dyn HumanInput> = Arc::new(ConsoleInput::new());

    let mut ctx = AgentContext::from_config(config, llms, human.clone()).await?;
    if !skip_index {
        prompt_index_project_files(
            human.as_ref(),
            &config.work_dir,
            &ctx.ignore,
            ctx.llms.mini.named("Describer"),
            ctx.embedder.clone(),
        )
        .await?;
        ctx.connect_retrieval().await?;
    }

    telemetry_event(event);
    tracing::info!(
        work_dir = %config.work_dir.display(),
        retrieval = ctx.retriever.is_some(),
        frontend = ctx.frontend_url.is_some(),
        "Clean Coder ready"
    );
    Ok(ctx)
}
