//! Generic Tool Coordinator for Multi-Turn Tool Calling
//!
//! This module provides a provider-agnostic `ToolCoordinator` that works with any
//! `LLMClient` implementation. It is the control loop behind both the dispatch
//! agent and every research worker:
//!
//! 1. Send the conversation with available tools to the LLM
//! 2. If the model requests tool calls, execute them through the capability table
//! 3. Send tool results back to the model
//! 4. Repeat until the model answers without tool calls, or the iteration
//!    budget runs out, in which case the model is asked once more (without
//!    tools) for its final answer
//!
//! # Example
//!
//! ```rust,ignore
//! use deepdive::llm::coordinator::{ToolCoordinator, ToolCallingConfig};
//! use deepdive::tools::ToolRegistry;
//! use std::sync::Arc;
//!
//! let coordinator = ToolCoordinator::new(client, Arc::new(registry), ToolCallingConfig::default());
//! let result = coordinator.execute(Some("You are a researcher."), "Find X").await?;
//! println!("{} ({} tool calls)", result.content, result.tool_calls.len());
//! ```

use crate::llm::client::{LLMClient, TokenUsage};
use crate::tools::registry::ToolRegistry;
use crate::types::{AppError, Result, ToolCall};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Message appended when the iteration budget is exhausted.
const FINAL_ANSWER_REQUEST: &str = "You have reached the maximum number of tool-calling steps. \
Do not call any more tools. Using only the information gathered so far, write your final answer now.";

/// Configuration for tool calling coordination behavior.
#[derive(Debug, Clone)]
pub struct ToolCallingConfig {
    /// Maximum number of LLM round-trips that may request tools.
    pub max_iterations: usize,

    /// Whether to execute multiple tool calls from one turn in parallel.
    pub parallel_execution: bool,

    /// Timeout for individual tool execution. `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,

    /// Whether to stop on the first tool error, or report it back to the model.
    pub stop_on_error: bool,
}

impl Default for ToolCallingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            parallel_execution: false,
            tool_timeout: Some(Duration::from_secs(30)),
            stop_on_error: false,
        }
    }
}

/// Record of a single tool call execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Unique identifier for this tool call (from the LLM).
    pub id: String,
    /// Name of the tool that was called.
    pub name: String,
    /// Arguments passed to the tool.
    pub arguments: serde_json::Value,
    /// Result returned by the tool (or error object).
    pub result: serde_json::Value,
    /// Whether the tool execution was successful.
    pub success: bool,
    /// Time taken to execute the tool in milliseconds.
    pub duration_ms: u64,
    /// Error message if the tool failed.
    pub error: Option<String>,
}

/// Reason why a tool coordination session ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FinishReason {
    /// Model decided to stop (no more tool calls).
    Stop,
    /// Hit the maximum iterations limit and was asked for a final answer.
    MaxIterations,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::MaxIterations => write!(f, "max_iterations"),
        }
    }
}

/// A message in a tool-calling conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The text content of the message.
    pub content: String,
    /// Tool calls requested by the assistant (only for Assistant role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool result content (only for Tool role).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Role of a message sender in a tool-calling conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
    /// Tool execution result.
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl ConversationMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message with optional tool calls.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool result message. String results are passed through as-is.
    pub fn tool_result(tool_call_id: impl Into<String>, result: &serde_json::Value) -> Self {
        let content = match result {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
        };
        Self {
            role: MessageRole::Tool,
            content,
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Result of a complete tool coordination session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorResult {
    /// Final text response from the model.
    pub content: String,

    /// All tool calls made during the session.
    pub tool_calls: Vec<ToolCallRecord>,

    /// Number of LLM iterations (round-trips) performed.
    pub iterations: usize,

    /// Why the session ended.
    pub finish_reason: FinishReason,

    /// Accumulated token usage across all iterations.
    pub total_usage: TokenUsage,

    /// Full message history.
    pub message_history: Vec<ConversationMessage>,
}

/// Tool-calling control loop over one LLM client and one capability table.
///
/// The registry is the complete capability set of the loop: definitions sent
/// to the model and calls executed both come from it and nothing else.
pub struct ToolCoordinator {
    client: Arc<dyn LLMClient>,
    registry: Arc<ToolRegistry>,
    config: ToolCallingConfig,
}

impl ToolCoordinator {
    /// Create a new ToolCoordinator with the given client, registry, and config.
    pub fn new(
        client: Arc<dyn LLMClient>,
        registry: Arc<ToolRegistry>,
        config: ToolCallingConfig,
    ) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    /// Create a new ToolCoordinator with default configuration.
    pub fn with_defaults(client: Arc<dyn LLMClient>, registry: Arc<ToolRegistry>) -> Self {
        Self::new(client, registry, ToolCallingConfig::default())
    }

    /// Execute a complete tool-calling conversation loop.
    pub async fn execute(&self, system: Option<&str>, prompt: &str) -> Result<CoordinatorResult> {
        let tools = self.registry.get_tool_definitions();
        let mut messages: Vec<ConversationMessage> = Vec::new();
        let mut all_tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut total_usage = TokenUsage::default();

        if let Some(sys) = system {
            messages.push(ConversationMessage::system(sys));
        }
        messages.push(ConversationMessage::user(prompt));

        for iteration in 0..self.config.max_iterations {
            let response = self
                .client
                .generate_with_tools_and_history(&messages, &tools)
                .await?;

            if let Some(usage) = &response.usage {
                total_usage = total_usage.add(usage);
            }

            messages.push(ConversationMessage::assistant(
                &response.content,
                response.tool_calls.clone(),
            ));

            if response.tool_calls.is_empty() {
                return Ok(CoordinatorResult {
                    content: response.content,
                    tool_calls: all_tool_calls,
                    iterations: iteration + 1,
                    finish_reason: FinishReason::Stop,
                    total_usage,
                    message_history: messages,
                });
            }

            debug!(
                iteration = iteration + 1,
                calls = response.tool_calls.len(),
                "Executing tool calls"
            );

            let tool_results = self.execute_tool_calls(&response.tool_calls).await?;
            for record in tool_results {
                messages.push(ConversationMessage::tool_result(&record.id, &record.result));
                all_tool_calls.push(record);
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            model = self.client.model_name(),
            "Tool-calling budget exhausted, requesting final answer"
        );

        messages.push(ConversationMessage::user(FINAL_ANSWER_REQUEST));
        let response = self
            .client
            .generate_with_tools_and_history(&messages, &[])
            .await?;
        if let Some(usage) = &response.usage {
            total_usage = total_usage.add(usage);
        }
        messages.push(ConversationMessage::assistant(&response.content, Vec::new()));

        Ok(CoordinatorResult {
            content: response.content,
            tool_calls: all_tool_calls,
            iterations: self.config.max_iterations + 1,
            finish_reason: FinishReason::MaxIterations,
            total_usage,
            message_history: messages,
        })
    }

    /// Execute tool calls, either in parallel or sequentially based on config.
    async fn execute_tool_calls(&self, calls: &[ToolCall]) -> Result<Vec<ToolCallRecord>> {
        let records = if self.config.parallel_execution {
            join_all(calls.iter().map(|call| self.execute_single_tool(call))).await
        } else {
            let mut records = Vec::with_capacity(calls.len());
            for call in calls {
                records.push(self.execute_single_tool(call).await);
            }
            records
        };

        if self.config.stop_on_error {
            if let Some(failed) = records.iter().find(|r| !r.success) {
                return Err(AppError::Tool(format!(
                    "Tool '{}' failed: {}",
                    failed.name,
                    failed.error.as_deref().unwrap_or("unknown error")
                )));
            }
        }

        Ok(records)
    }

    /// Execute a single tool call, converting every failure into an error record.
    async fn execute_single_tool(&self, call: &ToolCall) -> ToolCallRecord {
        let start = Instant::now();

        let outcome = if !self.registry.has_tool(&call.name) {
            Err(format!(
                "Unknown tool '{}'. Available tools: {}",
                call.name,
                self.registry.tool_names().join(", ")
            ))
        } else if let Value::String(raw) = &call.arguments {
            Err(format!(
                "Arguments for '{}' are not valid JSON: {}",
                call.name, raw
            ))
        } else {
            let execution = self.registry.execute(&call.name, call.arguments.clone());
            match self.config.tool_timeout {
                Some(limit) => match timeout(limit, execution).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err("Tool execution timed out".to_string()),
                },
                None => execution.await.map_err(|e| e.to_string()),
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => ToolCallRecord {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: value,
                success: true,
                duration_ms,
                error: None,
            },
            Err(message) => {
                warn!(tool = %call.name, error = %message, "Tool call failed");
                ToolCallRecord {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: serde_json::json!({ "error": message }),
                    success: false,
                    duration_ms,
                    error: Some(message),
                }
            }
        }
    }

    /// Get a reference to the underlying LLM client.
    pub fn client(&self) -> &dyn LLMClient {
        self.client.as_ref()
    }

    /// Get a reference to the tool registry.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ToolCallingConfig {
        &self.config
    }
}
