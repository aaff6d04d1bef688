//! Mock implementations for testing.
//!
//! This module provides mock LLM clients, a search backend and a tool session
//! factory that can be shared across integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use deepdive::llm::coordinator::{ConversationMessage, MessageRole};
use deepdive::llm::{LLMClient, LLMResponse, ResponseSchema, TextStream};
use deepdive::tools::mcp::{SessionState, ToolSession, ToolSessionFactory};
use deepdive::tools::search::{SearchBackend, SearchHit};
use deepdive::tools::Tool;
use deepdive::types::{AppError, Result, ToolCall, ToolDefinition};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Responder =
    Arc<dyn Fn(&[ConversationMessage], &[ToolDefinition]) -> Result<LLMResponse> + Send + Sync>;

/// Mock LLM client for testing with configurable responses.
///
/// Plain, streamed and structured requests answer with a fixed text (or fail
/// when none is set). Tool-calling requests are answered by a responder
/// closure that sees the whole conversation.
///
/// # Examples
///
/// ```ignore
/// // Planner that always answers "P"
/// let planner = MockLLMClient::new("P");
///
/// // Worker that writes a report named after its subtask
/// let worker = MockLLMClient::responding(|messages, _| Ok(LLMResponse::text("report")));
///
/// // Client that always fails
/// let broken = MockLLMClient::failing();
///
/// // Dispatcher stuck in its first tool-calling turn
/// let stuck = MockLLMClient::hanging();
/// ```
#[derive(Clone)]
pub struct MockLLMClient {
    text: Option<String>,
    responder: Option<Responder>,
    tool_names: Arc<Mutex<Vec<Vec<String>>>>,
    calls: Arc<AtomicUsize>,
    hang: bool,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given text.
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            responder: None,
            tool_names: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            hang: false,
        }
    }

    /// Create a mock client whose tool-calling turns come from `responder`.
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&[ConversationMessage], &[ToolDefinition]) -> Result<LLMResponse>
            + Send
            + Sync
            + 'static,
    {
        Self {
            text: None,
            responder: Some(Arc::new(responder)),
            ..Self::failing()
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            text: None,
            responder: None,
            tool_names: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            hang: false,
        }
    }

    /// Create a mock client whose tool-calling turns never complete.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::failing()
        }
    }

    /// Number of requests of any kind received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tool names offered with each tool-calling request
    pub fn offered_tools(&self) -> Vec<Vec<String>> {
        self.tool_names.lock().clone()
    }

    fn fixed_text(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| AppError::LLM("Mock LLM failure".to_string()))
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        self.fixed_text()
    }

    async fn stream_with_system(&self, _system: &str, _prompt: &str) -> Result<TextStream> {
        let text = self.fixed_text()?;
        let words: Vec<Result<String>> = text
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::new(stream::iter(words).boxed()))
    }

    async fn generate_structured(
        &self,
        _system: &str,
        _prompt: &str,
        _schema: &ResponseSchema,
    ) -> Result<Option<String>> {
        self.fixed_text().map(Some)
    }

    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tool_names
            .lock()
            .push(tools.iter().map(|t| t.name.clone()).collect());
        if self.hang {
            futures::future::pending::<()>().await;
        }
        match &self.responder {
            Some(responder) => responder(messages, tools),
            None => Err(AppError::LLM("Mock LLM failure".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// First user message of a conversation
pub fn user_prompt(messages: &[ConversationMessage]) -> &str {
    messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

/// Contents of all tool results in a conversation, in order
pub fn tool_results(messages: &[ConversationMessage]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .map(|m| m.content.clone())
        .collect()
}

/// A dispatch call for one subtask
pub fn spawn_call(call_id: &str, id: &str, title: &str, description: &str) -> ToolCall {
    ToolCall {
        id: call_id.to_string(),
        name: "initialize_subagent".to_string(),
        arguments: json!({
            "subtask_id": id,
            "subtask_title": title,
            "subtask_description": description,
        }),
    }
}

/// Dispatch agent that requests `calls` once, then answers with all tool
/// results joined by a blank line.
pub fn concatenating_dispatcher(calls: Vec<ToolCall>) -> MockLLMClient {
    MockLLMClient::responding(move |messages, _tools| {
        let results = tool_results(messages);
        if results.is_empty() && !calls.is_empty() {
            Ok(LLMResponse::tool_calls(calls.clone()))
        } else {
            Ok(LLMResponse::text(results.join("\n\n")))
        }
    })
}

/// Worker that answers `report <subtask id>` without calling tools.
pub fn reporting_worker() -> MockLLMClient {
    MockLLMClient::responding(|messages, _tools| {
        let prompt = user_prompt(messages);
        let id = prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix("- ID: "))
            .unwrap_or("?");
        Ok(LLMResponse::text(format!("report {}", id)))
    })
}

/// Search backend returning the same hits for every query.
pub struct StubSearch {
    pub hits: Vec<SearchHit>,
    pub queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self {
            hits: vec![SearchHit {
                title: "ESG outlook 2024".to_string(),
                link: "https://example.com/esg".to_string(),
                snippet: "Sustainable fund flows slowed in 2024.".to_string(),
            }],
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SearchBackend for StubSearch {
    async fn search(&self, query: &str, result_count: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().push(query.to_string());
        Ok(self.hits.iter().take(result_count).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Remote tool echoing its arguments while its session is open.
pub struct RemoteEcho {
    name: String,
    state: SessionState,
}

#[async_trait]
impl Tool for RemoteEcho {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Scrape a web page"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"url": {"type": "string"}}})
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        self.state.ensure_open(&self.name)?;
        Ok(json!({ "echo": args }))
    }
}

/// Session factory counting opens and closes.
#[derive(Default)]
pub struct StubSessionFactory {
    pub fail_open: bool,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub issued: Mutex<Vec<Arc<dyn Tool>>>,
}

impl StubSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct StubSession {
    tools: Vec<Arc<dyn Tool>>,
    state: SessionState,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolSession for StubSession {
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.mark_closed();
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ToolSessionFactory for StubSessionFactory {
    async fn open(&self) -> Result<Box<dyn ToolSession>> {
        if self.fail_open {
            return Err(AppError::ResourceAcquisition(
                "connection refused".to_string(),
            ));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        let state = SessionState::new();
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(RemoteEcho {
            name: "scrape".to_string(),
            state: state.clone(),
        })];
        self.issued.lock().extend(tools.iter().cloned());

        Ok(Box::new(StubSession {
            tools,
            state,
            closed: Arc::clone(&self.closed),
        }))
    }

    fn describe(&self) -> String {
        "stub server".to_string()
    }
}
