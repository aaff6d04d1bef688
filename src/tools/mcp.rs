//! Tool-protocol sessions
//!
//! A session is a long-lived connection to a tool server. It is opened once per
//! research run, enumerates the server's tools at start, and is closed exactly
//! once when the run ends. Remote tools handed out by a session refuse calls
//! once the session is closed.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An open connection to a tool server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Tools discovered when the session was opened
    fn tools(&self) -> Vec<Arc<dyn Tool>>;

    /// Release the connection. Consumes the session so it cannot run twice.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens tool sessions.
#[async_trait]
pub trait ToolSessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ToolSession>>;

    /// Human-readable target, for progress lines
    fn describe(&self) -> String;
}

/// Shared open/closed flag between a session and the tools it handed out.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    closed: Arc<AtomicBool>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Error out when the owning session has been closed
    pub fn ensure_open(&self, tool: &str) -> Result<()> {
        if self.is_closed() {
            return Err(AppError::Tool(format!(
                "Tool '{}' used after its session was closed",
                tool
            )));
        }
        Ok(())
    }
}

/// Factory for runs that have no tool server.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionFactory;

struct NoopSession;

#[async_trait]
impl ToolSession for NoopSession {
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ToolSessionFactory for NoopSessionFactory {
    async fn open(&self) -> Result<Box<dyn ToolSession>> {
        Ok(Box::new(NoopSession))
    }

    fn describe(&self) -> String {
        "no tool server".to_string()
    }
}

#[cfg(feature = "mcp")]
pub use remote::McpSessionFactory;

#[cfg(feature = "mcp")]
mod remote {
    use super::*;
    use rmcp::model::{CallToolRequestParam, CallToolResult};
    use rmcp::service::{Peer, RunningService};
    use rmcp::transport::StreamableHttpClientTransport;
    use rmcp::{RoleClient, ServiceExt};
    use serde_json::json;

    /// Connects to an MCP server over streamable HTTP.
    #[derive(Debug, Clone)]
    pub struct McpSessionFactory {
        url: String,
    }

    impl McpSessionFactory {
        pub fn new(url: impl Into<String>) -> Self {
            Self { url: url.into() }
        }
    }

    #[async_trait]
    impl ToolSessionFactory for McpSessionFactory {
        async fn open(&self) -> Result<Box<dyn ToolSession>> {
            let transport = StreamableHttpClientTransport::from_uri(self.url.as_str());
            let service = ().serve(transport).await.map_err(|e| {
                AppError::ResourceAcquisition(format!(
                    "Failed to connect to MCP server at {}: {}",
                    self.url, e
                ))
            })?;

            let listed = match service.list_all_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    let _ = service.cancel().await;
                    return Err(AppError::ResourceAcquisition(format!(
                        "Failed to list tools from {}: {}",
                        self.url, e
                    )));
                }
            };

            let state = SessionState::new();
            let peer = service.peer().clone();
            let tools: Vec<Arc<dyn Tool>> = listed
                .into_iter()
                .map(|tool| {
                    Arc::new(McpRemoteTool {
                        peer: peer.clone(),
                        name: tool.name.to_string(),
                        description: tool.description.as_deref().unwrap_or_default().to_string(),
                        schema: Value::Object((*tool.input_schema).clone()),
                        state: state.clone(),
                    }) as Arc<dyn Tool>
                })
                .collect();

            tracing::info!(url = %self.url, tools = tools.len(), "MCP session opened");
            Ok(Box::new(McpSession {
                service,
                tools,
                state,
            }))
        }

        fn describe(&self) -> String {
            self.url.clone()
        }
    }

    struct McpSession {
        service: RunningService<RoleClient, ()>,
        tools: Vec<Arc<dyn Tool>>,
        state: SessionState,
    }

    #[async_trait]
    impl ToolSession for McpSession {
        fn tools(&self) -> Vec<Arc<dyn Tool>> {
            self.tools.clone()
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.state.mark_closed();
            self.service
                .cancel()
                .await
                .map(|reason| tracing::debug!(?reason, "MCP session closed"))
                .map_err(|e| AppError::Internal(format!("Failed to close MCP session: {}", e)))
        }
    }

    /// A tool enumerated from the server, called through the shared peer.
    struct McpRemoteTool {
        peer: Peer<RoleClient>,
        name: String,
        description: String,
        schema: Value,
        state: SessionState,
    }

    #[async_trait]
    impl Tool for McpRemoteTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            &self.description
        }

        fn parameters_schema(&self) -> Value {
            self.schema.clone()
        }

        async fn execute(&self, args: Value) -> Result<Value> {
            self.state.ensure_open(&self.name)?;

            let arguments = match args {
                Value::Object(map) => Value::Object(map),
                Value::Null => json!({}),
                other => {
                    return Err(AppError::InvalidInput(format!(
                        "Tool '{}' expects an object, got {}",
                        self.name, other
                    )))
                }
            };
            let request: CallToolRequestParam =
                serde_json::from_value(json!({ "name": self.name, "arguments": arguments }))
                    .map_err(|e| AppError::Internal(format!("Bad tool request: {}", e)))?;

            let result: CallToolResult = self
                .peer
                .call_tool(request)
                .await
                .map_err(|e| AppError::Tool(format!("MCP call '{}' failed: {}", self.name, e)))?;

            let failed = result.is_error.unwrap_or(false);
            let value = serde_json::to_value(&result)
                .map_err(|e| AppError::Internal(format!("Bad tool result: {}", e)))?;
            if failed {
                return Err(AppError::Tool(format!(
                    "MCP tool '{}' reported an error: {}",
                    self.name,
                    content_text(&value)
                )));
            }
            Ok(value)
        }
    }

    /// Joined text blocks of a serialized tool result
    fn content_text(value: &Value) -> String {
        value
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

}
