use crate::llm::{LLMClient, ResponseSchema};
use crate::research::decoder::{decode, Decoded};
use crate::research::prompts::TASK_SPLITTER_SYSTEM_INSTRUCTIONS;
use crate::types::{AppError, ResearchPlan, Result, SubtaskList};
use crate::utils::progress::SharedSink;
use std::sync::Arc;
use tracing::{info, warn};

/// Name under which the subtask schema is sent to the provider
pub const SUBTASK_SCHEMA_NAME: &str = "subtaskList";

/// Converts a research plan into a list of independent subtasks.
pub struct TaskDecomposer {
    client: Arc<dyn LLMClient>,
    schema: ResponseSchema,
    sink: SharedSink,
}

impl TaskDecomposer {
    pub fn new(client: Arc<dyn LLMClient>, sink: SharedSink) -> Self {
        Self {
            client,
            schema: ResponseSchema::for_type::<SubtaskList>(SUBTASK_SCHEMA_NAME),
            sink,
        }
    }

    /// One structured request, decoded strictly then loosely.
    ///
    /// Duplicate ids and an empty list are accepted.
    pub async fn decompose(&self, plan: &ResearchPlan) -> Result<SubtaskList> {
        self.sink.line("Splitting the research plan into subtasks...");
        self.sink.line(&format!("Model: {}", self.client.model_name()));
        self.sink
            .line(&format!("Provider: {}", self.client.provider_name()));

        let body = self
            .client
            .generate_structured(TASK_SPLITTER_SYSTEM_INSTRUCTIONS, plan.as_str(), &self.schema)
            .await
            .map_err(|e| AppError::Decomposition {
                message: format!("structured request failed: {}", e),
                raw: None,
            })?;

        let body = body
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| AppError::Decomposition {
                message: "provider returned no content".to_string(),
                raw: None,
            })?;

        let subtasks = match decode(&body) {
            Decoded::Strict(list) => list,
            Decoded::Loose(list) => {
                warn!(raw = %body, "subtask payload failed schema validation, using loose decode");
                list
            }
            Decoded::Failed(cause) => {
                warn!(raw = %body, %cause, "subtask payload could not be decoded");
                return Err(AppError::Decomposition {
                    message: cause,
                    raw: Some(body),
                });
            }
        };

        let duplicates = subtasks.duplicate_ids();
        if !duplicates.is_empty() {
            warn!(ids = ?duplicates, "decomposition produced duplicate subtask ids");
        }

        info!(count = subtasks.len(), "plan decomposed");
        self.sink.line("Generated the following subtasks:");
        for subtask in &subtasks {
            self.sink.line(&format!("[{}] {}", subtask.id, subtask.title));
            self.sink.line(&subtask.description);
        }

        Ok(subtasks)
    }
}
