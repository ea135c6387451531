//! clean-coder - single task entry point
//!
//! Researches, plans, executes and debugs one task in `WORK_DIR`.

use clap::Parser;

use clean_coder::agents::GraphError;
use clean_coder::pipeline::run_clean_coder_pipeline;
use clean_coder::startup::{init_tracing, load_config, prepare_context};

#[derive(Parser)]
#[command(name = "clean-coder")]
#[command(about = "Plan and implement a coding task in your project with AI agents")]
#[command(version)]
struct Cli {
    /// Task to execute; asked interactively when missing
    #[arg(long)]
    task: Option<String>,

    /// Look up documentation of the Python libraries the task needs
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
    let ctx = prepare_context(&config, cli.skip_index, "single_task_coder_started").await?;

    let task = match cli.task {
        Some(task) => task,
        None => ctx.human.ask("Provide task to be executed. ").await?,
    };

    match run_clean_coder_pipeline(&ctx, &task, cli.doc_harvest).await {
        Ok(outcome) => {
            tracing::info!(files = outcome.files.len(), debugged = outcome.debugged, "Task finished");
            Ok(())
        }
        Err(GraphError::Interrupted) => {
            println!("Bye!");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
