//! # deepdive - Deep Research Pipeline
//!
//! deepdive turns a free-text research question into a single synthesized
//! report. A planner model drafts a research plan, a decomposer model splits
//! it into independent subtasks, and a dispatch agent spawns one tool-using
//! worker per subtask before writing the final report from their findings.
//!
//! ## Overview
//!
//! deepdive can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `deepdive` binary
//! 2. **As a library** - Import the pipeline into your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use deepdive::{DeepdiveConfig, ResearchCoordinator};
//! use deepdive::utils::TracingSink;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeepdiveConfig::load("deepdive.toml")?;
//!     let coordinator = ResearchCoordinator::from_config(&config, Arc::new(TracingSink))?;
//!
//!     let report = coordinator.run("ESG trends 2024").await?;
//!     println!("{}", report.content);
//!     Ok(())
//! }
//! ```
//!
//! ### Custom Stages
//!
//! Every stage can be swapped out, which is how the tests drive the pipeline:
//!
//! ```rust,ignore
//! let coordinator = ResearchCoordinator::builder()
//!     .planner(planner_client)
//!     .decomposer(decomposer_client)
//!     .dispatcher(coordinator_client)
//!     .subagent(worker_client)
//!     .search(Arc::new(DuckDuckGoSearch))
//!     .sessions(Arc::new(McpSessionFactory::new("http://localhost:8000/mcp/")))
//!     .build()?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `mcp` | Model Context Protocol client for remote retrieval tools (default) |
//!
//! ## Modules
//!
//! - [`llm`] - LLM client implementations and the tool-calling loop
//! - [`research`] - Planner, decomposer, workers and the research coordinator
//! - [`tools`] - Capability table, web search and tool-protocol sessions
//! - [`types`] - Research data model and error handling
//! - [`utils`] - Configuration and progress reporting

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Plan, decompose, dispatch and synthesize.
pub mod research;
/// Worker and dispatch capabilities.
pub mod tools;
/// Core types (research data model, errors).
pub mod types;
/// Configuration and progress reporting.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, LLMClientFactory, LLMResponse, ModelRole, Provider};
pub use research::{ResearchCoordinator, ResearchCoordinatorBuilder};
pub use tools::registry::{Tool, ToolRegistry};
pub use types::{AppError, FinalReport, Result, Subtask, SubtaskList};
pub use utils::progress::{ProgressEvent, ProgressSink, SharedSink};
pub use utils::toml_config::{ConfigError, DeepdiveConfig};
