//! # Clean Coder
//!
//! Multi-agent coding pipeline working on a project directory.
//!
//! ```text
//!   task ──► Researcher ──► Planner ◄──► human
//!                              │
//!                              ▼
//!                          Executor ──(concurrently)── frontend screenshot code
//!                              │
//!                              ▼
//!                     human test ──► Debugger ◄──► human
//! ```
//!
//! The Manager plans a whole project as Todoist tasks and runs each one
//! through the same pipeline.
//!
//! ## Modules
//! - `agents`: the agents and the loop they share
//! - `llm`: provider clients with fallback
//! - `tools`: file, editing and project-management tools
//! - `rag`: file descriptions, vector collection and re-ranking
//! - `tracker`: Todoist task tracker

pub mod agents;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod human;
pub mod ignore;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod rag;
pub mod startup;
pub mod syntax;
pub mod tools;
pub mod tracker;
pub mod util;
pub mod workdir;

pub use config::Config;
