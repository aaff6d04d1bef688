//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for interacting with chat-completion
//! providers. It abstracts provider specifics behind one trait so that the
//! planner, the decomposer, the dispatch agent and the workers can each run on
//! a different model.
//!
//! # Architecture
//!
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`Provider`] - Runtime provider selection
//! - [`LLMClientFactory`] - Creates clients from the `[models.*]` configuration
//! - [`coordinator::ToolCoordinator`] - The tool-calling agent loop
//!
//! # Example
//!
//! ```ignore
//! use deepdive::llm::{LLMClientFactory, ModelRole};
//!
//! let factory = LLMClientFactory::new(config);
//! let client = factory.create_for(ModelRole::Planner)?;
//! let plan = client.generate_with_system("You plan research.", "ESG trends").await?;
//! ```
//!
//! # Streaming
//!
//! `stream_with_system` returns text fragments in arrival order as a boxed
//! `futures::Stream`.

/// Core LLM client trait, provider enum and client factory.
pub mod client;
/// Multi-turn tool calling loop.
pub mod coordinator;
/// OpenAI-compatible HTTP client.
pub mod openai;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    LLMClient, LLMClientFactory, LLMResponse, ModelParams, ModelRole, Provider, ResponseSchema,
    TextStream, TokenUsage,
};
pub use coordinator::{
    ConversationMessage, CoordinatorResult, FinishReason, MessageRole, ToolCallingConfig,
    ToolCoordinator,
};
