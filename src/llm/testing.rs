//! Scripted LLM client for unit tests.

use crate::llm::client::{LLMClient, LLMResponse, ResponseSchema, TextStream};
use crate::llm::coordinator::ConversationMessage;
use crate::types::{AppError, Result, ToolDefinition};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Replays queued tool-calling responses and a fixed text answer.
pub(crate) struct ScriptedClient {
    turns: Mutex<VecDeque<LLMResponse>>,
    text: Option<String>,
    tool_counts: Mutex<Vec<usize>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub(crate) fn new(turns: Vec<LLMResponse>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            text: None,
            tool_counts: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client answering every plain or structured request with `text`.
    pub(crate) fn text(text: Option<&str>) -> Self {
        Self {
            text: text.map(str::to_string),
            ..Self::new(Vec::new())
        }
    }

    /// Number of tool definitions sent with each tool-calling request.
    pub(crate) fn tool_counts(&self) -> Vec<usize> {
        self.tool_counts.lock().clone()
    }

    /// User prompts received, in order.
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.text
            .clone()
            .ok_or_else(|| AppError::LLM("scripted failure".to_string()))
    }

    async fn stream_with_system(&self, _system: &str, prompt: &str) -> Result<TextStream> {
        self.prompts.lock().push(prompt.to_string());
        let text = self
            .text
            .clone()
            .ok_or_else(|| AppError::LLM("scripted failure".to_string()))?;
        let chunks: Vec<Result<String>> = text
            .chars()
            .collect::<Vec<_>>()
            .chunks(3)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::new(stream::iter(chunks).boxed()))
    }

    async fn generate_structured(
        &self,
        _system: &str,
        prompt: &str,
        _schema: &ResponseSchema,
    ) -> Result<Option<String>> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.text.clone())
    }

    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        if let Some(last) = messages.iter().rev().find(|m| m.tool_call_id.is_none()) {
            self.prompts.lock().push(last.content.clone());
        }
        self.tool_counts.lock().push(tools.len());
        self.turns
            .lock()
            .pop_front()
            .ok_or_else(|| AppError::LLM("script exhausted".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}
