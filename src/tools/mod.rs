//! Capabilities for Research Workers
//!
//! Workers act on the world only through tools. A tool is a named, callable
//! unit with a declared JSON input schema; the agent loop sees nothing else.
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - The capability table handed to each agent loop
//! - [`search`](crate::tools::search) - Web search backends (SerpAPI, DuckDuckGo) and page fetch
//! - [`mcp`](crate::tools::mcp) - Remote tools discovered from a tool-protocol server
//!
//! # Tool Registry
//!
//! ```ignore
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(WebSearchTool::new(backend, sink)));
//! let definitions = registry.get_tool_definitions();
//! let result = registry.execute("search_web", json!({"query": "ESG trends"})).await?;
//! ```
//!
//! # Tool Sessions
//!
//! Remote tools are only valid while their [`ToolSession`](crate::tools::mcp::ToolSession)
//! is open. The research coordinator opens one session per run and closes it
//! when the run ends.

/// Tool-protocol sessions and remote tools.
pub mod mcp;
/// Tool registry for managing available tools.
pub mod registry;
/// Web search and page fetch tools.
pub mod search;

pub use mcp::{NoopSessionFactory, ToolSession, ToolSessionFactory};
#[cfg(feature = "mcp")]
pub use mcp::McpSessionFactory;
pub use registry::{Tool, ToolRegistry};
pub use search::{
    DuckDuckGoSearch, FetchPageTool, SearchBackend, SearchHit, SerpApiSearch, WebSearchTool,
};
