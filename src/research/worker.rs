//! Research workers
//!
//! A worker is one tool-calling agent loop bound to a single subtask. It sees
//! only the capability table it is handed and keeps no state between runs.
//! [`SpawnSubagentTool`] exposes worker spawning to the dispatch agent as the
//! `initialize_subagent` capability.

use crate::llm::{LLMClient, ToolCallingConfig, ToolCoordinator};
use crate::research::prompts::{render, SUBAGENT_PROMPT_TEMPLATE};
use crate::tools::registry::{Tool, ToolRegistry};
use crate::types::{AppError, Result, SharedContext, Subtask, WorkerReport};
use crate::utils::progress::SharedSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds and runs one worker per subtask.
pub struct WorkerSpawner {
    client: Arc<dyn LLMClient>,
    config: ToolCallingConfig,
}

impl WorkerSpawner {
    pub fn new(client: Arc<dyn LLMClient>, config: ToolCallingConfig) -> Self {
        Self { client, config }
    }

    /// Render the worker prompt for a subtask
    pub fn render_prompt(subtask: &Subtask, context: &SharedContext) -> String {
        render(
            SUBAGENT_PROMPT_TEMPLATE,
            &[
                ("user_query", context.query.as_str()),
                ("research_plan", context.plan.as_str()),
                ("subtask_id", &subtask.id),
                ("subtask_title", &subtask.title),
                ("subtask_description", &subtask.description),
            ],
        )
    }

    /// Run a fresh worker for `subtask`, restricted to `tools`, to completion.
    pub async fn spawn_and_run(
        &self,
        subtask: &Subtask,
        context: &SharedContext,
        tools: Arc<ToolRegistry>,
    ) -> Result<WorkerReport> {
        let prompt = Self::render_prompt(subtask, context);
        let worker = ToolCoordinator::new(Arc::clone(&self.client), tools, self.config.clone());

        let result = worker
            .execute(None, &prompt)
            .await
            .map_err(|e| AppError::WorkerExecution {
                subtask_id: subtask.id.clone(),
                message: e.to_string(),
            })?;

        if result.content.trim().is_empty() {
            return Err(AppError::WorkerExecution {
                subtask_id: subtask.id.clone(),
                message: "worker finished without a report".to_string(),
            });
        }

        info!(
            subtask_id = %subtask.id,
            iterations = result.iterations,
            tool_calls = result.tool_calls.len(),
            finish = ?result.finish_reason,
            "worker finished"
        );

        Ok(WorkerReport {
            subtask_id: subtask.id.clone(),
            content: result.content,
        })
    }
}

/// Worker reports of one run, in completion order, plus the spawn count.
#[derive(Debug, Default)]
pub struct ReportLedger {
    reports: Mutex<Vec<WorkerReport>>,
    spawned: AtomicUsize,
}

impl ReportLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a spawn slot; false once `limit` workers have been started
    fn try_reserve(&self, limit: usize) -> bool {
        self.spawned
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    fn record(&self, report: WorkerReport) {
        self.reports.lock().push(report);
    }

    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> Vec<WorkerReport> {
        self.reports.lock().clone()
    }
}

/// `initialize_subagent`: the single capability of the dispatch agent.
pub struct SpawnSubagentTool {
    spawner: Arc<WorkerSpawner>,
    context: Arc<SharedContext>,
    tools: Arc<ToolRegistry>,
    ledger: Arc<ReportLedger>,
    max_workers: usize,
    sink: SharedSink,
}

impl SpawnSubagentTool {
    pub const NAME: &'static str = "initialize_subagent";

    pub fn new(
        spawner: Arc<WorkerSpawner>,
        context: Arc<SharedContext>,
        tools: Arc<ToolRegistry>,
        ledger: Arc<ReportLedger>,
        sink: SharedSink,
    ) -> Self {
        Self {
            spawner,
            context,
            tools,
            ledger,
            max_workers: usize::MAX,
            sink,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

fn required_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidInput(format!("Missing '{}' parameter", key)))
}

#[async_trait]
impl Tool for SpawnSubagentTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Spawn a dedicated research sub-agent for a single subtask. The sub-agent can search the web \
         and read pages, researches only this subtask, and returns a markdown report with a heading, \
         a narrative explanation, key findings and citations."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subtask_id": {
                    "type": "string",
                    "description": "The unique identifier for the subtask."
                },
                "subtask_title": {
                    "type": "string",
                    "description": "The descriptive title of the subtask."
                },
                "subtask_description": {
                    "type": "string",
                    "description": "Detailed instructions for the sub-agent to perform the subtask."
                }
            },
            "required": ["subtask_id", "subtask_title", "subtask_description"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let subtask = Subtask::new(
            required_str(&args, "subtask_id")?,
            required_str(&args, "subtask_title")?,
            required_str(&args, "subtask_description")?,
        );

        if !self.ledger.try_reserve(self.max_workers) {
            warn!(subtask_id = %subtask.id, limit = self.max_workers, "worker limit reached");
            return Err(AppError::Tool(format!(
                "Worker limit of {} reached; write the final report with the results you have",
                self.max_workers
            )));
        }

        self.sink
            .line(&format!("Initializing Subagent for task {}...", subtask.id));

        match self
            .spawner
            .spawn_and_run(&subtask, &self.context, Arc::clone(&self.tools))
            .await
        {
            Ok(report) => {
                self.sink
                    .line(&format!("Subagent for task {} finished", subtask.id));
                let content = report.content.clone();
                self.ledger.record(report);
                Ok(Value::String(content))
            }
            Err(e) => {
                self.sink
                    .line(&format!("Subagent for task {} failed: {}", subtask.id, e));
                Err(e)
            }
        }
    }
}
