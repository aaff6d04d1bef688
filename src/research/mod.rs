//! Deep Research Pipeline
//!
//! This module turns one free-text research question into one synthesized
//! report by coordinating several LLM-driven agents.
//!
//! # Architecture
//!
//! - [`planner::PlanGenerator`] - Writes a free-text research plan (optionally streamed)
//! - [`decomposer::TaskDecomposer`] - Splits the plan into subtasks via structured output
//! - [`decoder`] - Strict then loose decoding of the subtask payload
//! - [`worker::WorkerSpawner`] - Runs one tool-using worker per subtask
//! - [`coordinator::ResearchCoordinator`] - Owns the run and the dispatch agent
//!
//! # Usage
//!
//! ```ignore
//! use deepdive::research::ResearchCoordinator;
//! use deepdive::utils::{DeepdiveConfig, TracingSink};
//! use std::sync::Arc;
//!
//! let config = DeepdiveConfig::load("deepdive.toml")?;
//! let coordinator = ResearchCoordinator::from_config(&config, Arc::new(TracingSink))?;
//!
//! let report = coordinator.run("ESG trends 2024").await?;
//! println!("{}", report.content);
//! ```
//!
//! # Research Workflow
//!
//! 1. **Planning** - The planner model drafts a research plan
//! 2. **Decomposition** - The plan becomes a list of `{id, title, description}` subtasks
//! 3. **Session** - The tool-protocol session and the search capability are opened
//! 4. **Dispatch** - A dispatch agent spawns a worker for each subtask it selects
//! 5. **Synthesis** - The dispatch agent's final answer is the report
//!
//! Failures in steps 1 and 2 abort the run before any session is opened.

/// End-to-end pipeline and dispatch agent.
pub mod coordinator;
/// Subtask payload decoding.
pub mod decoder;
/// Plan to subtask list.
pub mod decomposer;
/// Query to research plan.
pub mod planner;
/// Stage instructions and prompt templates.
pub mod prompts;
/// Per-subtask workers and the spawn capability.
pub mod worker;

pub use coordinator::{ResearchCoordinator, ResearchCoordinatorBuilder};
pub use decoder::{decode, Decoded};
pub use decomposer::TaskDecomposer;
pub use planner::PlanGenerator;
pub use worker::{ReportLedger, SpawnSubagentTool, WorkerSpawner};
