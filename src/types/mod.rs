use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============= Research Data Model =============

/// A user's research question. Never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchQuery(String);

impl ResearchQuery {
    /// Validate and wrap a raw query string.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Research query must not be empty".to_string(),
            ));
        }
        Ok(Self(query))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-text research strategy produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchPlan(String);

impl ResearchPlan {
    /// Wrap plan text, rejecting empty or whitespace-only output.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResearchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One bounded unit of research work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Subtask {
    /// Short identifier for the subtask (e.g. 'A', 'history', 'drivers').
    pub id: String,
    /// Short descriptive title of the subtask.
    pub title: String,
    /// Clear, detailed instructions for the sub-agent that will research this subtask.
    pub description: String,
}

impl Subtask {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
        }
    }

    /// Name of the first empty field, if any.
    pub fn first_empty_field(&self) -> Option<&'static str> {
        if self.id.trim().is_empty() {
            Some("id")
        } else if self.title.trim().is_empty() {
            Some("title")
        } else if self.description.trim().is_empty() {
            Some("description")
        } else {
            None
        }
    }
}

/// Ordered list of subtasks, in the shape requested from the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubtaskList {
    /// List of subtasks that together cover the whole research plan.
    pub subtasks: Vec<Subtask>,
}

impl SubtaskList {
    pub fn new(subtasks: Vec<Subtask>) -> Self {
        Self { subtasks }
    }

    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subtask> {
        self.subtasks.iter()
    }

    /// Ids that appear more than once, in first-seen order.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for subtask in &self.subtasks {
            if !seen.insert(subtask.id.as_str()) && !dups.contains(&subtask.id.as_str()) {
                dups.push(subtask.id.as_str());
            }
        }
        dups
    }
}

impl<'a> IntoIterator for &'a SubtaskList {
    type Item = &'a Subtask;
    type IntoIter = std::slice::Iter<'a, Subtask>;

    fn into_iter(self) -> Self::IntoIter {
        self.subtasks.iter()
    }
}

/// Markdown report written by one worker for one subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub subtask_id: String,
    pub content: String,
}

/// Query and plan shared read-only by every worker of a run.
#[derive(Debug, Clone)]
pub struct SharedContext {
    pub query: ResearchQuery,
    pub plan: ResearchPlan,
}

/// The pipeline's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    /// Identifier of the run that produced the report
    pub run_id: uuid::Uuid,
    /// Synthesized markdown report
    pub content: String,
    /// Worker reports in completion order, keyed by subtask id
    pub worker_reports: Vec<WorkerReport>,
    /// Number of subtasks the decomposer produced
    pub subtask_count: usize,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
}

// ============= Tool Types =============

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Plan generation failed ({model}): {message}")]
    UpstreamGeneration { model: String, message: String },

    #[error("Task decomposition failed: {message}")]
    Decomposition {
        message: String,
        /// Raw provider payload, kept for diagnosis
        raw: Option<String>,
    },

    #[error("Worker for subtask '{subtask_id}' failed: {message}")]
    WorkerExecution { subtask_id: String, message: String },

    #[error("Failed to acquire tool session: {0}")]
    ResourceAcquisition(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Pipeline stage the error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "input",
            AppError::UpstreamGeneration { .. } => "plan",
            AppError::Decomposition { .. } => "decompose",
            AppError::WorkerExecution { .. } => "worker",
            AppError::ResourceAcquisition(_) => "session",
            AppError::LLM(_) => "llm",
            AppError::Tool(_) | AppError::NotFound(_) => "tool",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
