use crate::llm::LLMClient;
use crate::research::prompts::PLANNER_SYSTEM_INSTRUCTIONS;
use crate::types::{AppError, ResearchPlan, ResearchQuery, Result};
use crate::utils::progress::SharedSink;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error};

/// Turns a research question into a free-text research plan.
///
/// One chat request per call, never retried. In streaming mode every
/// fragment is forwarded to the progress sink as it arrives; both modes
/// produce the same plan for the same model output.
pub struct PlanGenerator {
    client: Arc<dyn LLMClient>,
    stream: bool,
    sink: SharedSink,
}

impl PlanGenerator {
    pub fn new(client: Arc<dyn LLMClient>, sink: SharedSink) -> Self {
        Self {
            client,
            stream: true,
            sink,
        }
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub async fn generate_plan(&self, query: &ResearchQuery) -> Result<ResearchPlan> {
        self.sink.line(&format!(
            "Generating the research plan for the query: {}",
            query
        ));
        self.sink.line(&format!("Model: {}", self.client.model_name()));
        self.sink
            .line(&format!("Provider: {}", self.client.provider_name()));

        let result = if self.stream {
            self.sink.line("Generated research plan:");
            self.collect_stream(query).await
        } else {
            let text = self
                .client
                .generate_with_system(PLANNER_SYSTEM_INSTRUCTIONS, query.as_str())
                .await;
            if let Ok(plan) = &text {
                self.sink.line("Generated research plan:");
                self.sink.line(plan);
            }
            text
        };
        let text = result.map_err(|e| self.upstream_error(e.to_string()))?;

        debug!(chars = text.len(), streamed = self.stream, "plan generated");
        ResearchPlan::new(text).ok_or_else(|| self.upstream_error("model returned an empty plan"))
    }

    async fn collect_stream(&self, query: &ResearchQuery) -> Result<String> {
        let mut stream = self
            .client
            .stream_with_system(PLANNER_SYSTEM_INSTRUCTIONS, query.as_str())
            .await?;

        let mut plan = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            self.sink.fragment(&fragment);
            plan.push_str(&fragment);
        }
        Ok(plan)
    }

    fn upstream_error(&self, message: impl Into<String>) -> AppError {
        let message = message.into();
        error!(model = self.client.model_name(), %message, "plan generation failed");
        AppError::UpstreamGeneration {
            model: self.client.model_name().to_string(),
            message,
        }
    }
}
