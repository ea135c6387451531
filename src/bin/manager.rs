//! clean-coder-manager - project manager entry point
//!
//! Plans the project in Todoist and executes its tasks one by one.

use std::sync::Arc;

use clap::Parser;

use clean_coder::agents::{connect_tracker_project, GraphError, Manager, PipelineRunner};
use clean_coder::startup::{init_tracing, load_config, prepare_context};
use clean_coder::tools::ProjectBoard;
use clean_coder::tracker::{TaskTracker, TodoistClient};

#[derive(Parser)]
#[command(name = "clean-coder-manager")]
#[command(about = "Plan your project in Todoist and let AI agents execute it")]
#[command(version)]
struct Cli {
    /// Look up library documentation for every executed task
    #[arg(long)]
    doc_harvest: bool,

    /// Do not offer to index project files
    #[arg(long)]
    skip_index: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config()?;
    let Some(api_key) = config.todoist.api_key.clone() else {
        anyhow::bail!("TODOIST_API_KEY is required for the manager. Add it to your .env file");
    };
    let ctx = prepare_context(&config, cli.skip_index, "manager_started").await?;

    let tracker: Arc<dyn TaskTracker> = Arc::new(TodoistClient::new(&api_key));
    let project_id = connect_tracker_project(
        tracker.as_ref(),
        ctx.human.as_ref(),
        &config.work_dir,
        config.todoist.project_id.as_deref(),
    )
    .await?;
    tracing::info!(project = %project_id, "Connected to Todoist project");

    let board = ProjectBoard::new(tracker, project_id);
    let runner = Arc::new(PipelineRunner::new(ctx.clone(), cli.doc_harvest));
    let manager = Manager::with_runner(ctx, board, runner);

    match manager.run().await {
        Ok(_) | Err(GraphError::Interrupted) => {
            println!("Bye! Your progress is saved, run me again to continue.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
