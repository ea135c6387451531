//! Agents of the coding pipeline.
//!
//! # Agents
//! - **Researcher**: finds the files a task touches
//! - **Planner**: writes the plan of changes with the human
//! - **Executor**: applies the plan with editing tools
//! - **Debugger**: fixes problems the human reports
//! - **Manager**: plans a whole project in the task tracker
//!
//! Every tool-calling agent runs on the loop in [`graph`]. The planner has
//! no tools and keeps its own loop.

pub mod context;
pub mod debugger;
pub mod doc_harvester;
pub mod executor;
pub mod frontend_feedback;
pub mod graph;
pub mod manager;
pub mod planner;
pub mod researcher;

pub use context::AgentContext;
pub use debugger::Debugger;
pub use doc_harvester::DocHarvester;
pub use executor::{CodeFile, ExecutionResult, Executor};
pub use graph::{GraphError, GraphOutcome};
pub use manager::{connect_tracker_project, Manager, PipelineRunner};
pub use planner::Planner;
pub use researcher::{ResearchResult, Researcher};
