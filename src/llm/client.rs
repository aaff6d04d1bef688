//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for interacting with chat-completion
//! providers. Every provider is reached through an OpenAI-compatible endpoint:
//! - **OpenAI** (and compatible gateways such as OpenRouter or Hugging Face routers)
//! - **Ollama**, via its `/v1` compatibility layer

use crate::llm::coordinator::ConversationMessage;
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use crate::utils::toml_config::{DeepdiveConfig, ModelConfig, ProviderConfig};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Boxed stream of text fragments in arrival order.
pub type TextStream = Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion with a system instruction and one user message
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Stream a completion with a system instruction and one user message
    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream>;

    /// Generate a completion constrained to a JSON schema.
    ///
    /// Returns the raw message body, or `None` when the provider returned no content.
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Option<String>>;

    /// Generate with tool calling support over a full conversation
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Get the provider identifier
    fn provider_name(&self) -> &str {
        "unknown"
    }
}

/// Token usage statistics reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn add(&self, other: &TokenUsage) -> Self {
        Self::new(
            self.prompt_tokens + other.prompt_tokens,
            self.completion_tokens + other.completion_tokens,
        )
    }
}

/// Response from an LLM generation request
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    /// A plain text answer with no tool calls
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: None,
        }
    }

    /// A turn that only requests tool calls
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
            finish_reason: "tool_calls".to_string(),
            usage: None,
        }
    }
}

/// A named JSON schema requested as the response format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

impl ResponseSchema {
    /// Build a strict schema from a type deriving `JsonSchema`
    pub fn for_type<T: JsonSchema>(name: impl Into<String>) -> Self {
        let mut schema =
            serde_json::to_value(schemars::schema_for!(T)).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
        }
        Self {
            name: name.into(),
            schema,
            strict: true,
        }
    }
}

/// Sampling parameters applied to every request of a client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&ModelConfig> for ModelParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Provider enum for runtime selection
///
/// | Provider | Streaming | Tool Calling | Structured Output |
/// |----------|-----------|--------------|-------------------|
/// | OpenAI   | ✅        | ✅           | ✅ json_schema     |
/// | Ollama   | ✅        | ✅           | ✅ json_schema     |
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     params: Default::default(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },

    /// Ollama local LLM provider, reached through `{base_url}/v1`
    Ollama {
        base_url: String,
        model: String,
        params: ModelParams,
    },
}

impl Provider {
    /// Create a client instance for this provider
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                Some(api_key.clone()),
                api_base.clone(),
                model.clone(),
                params.clone(),
                self.name(),
            )?)),

            Provider::Ollama {
                base_url,
                model,
                params,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                None,
                format!("{}/v1", base_url.trim_end_matches('/')),
                model.clone(),
                params.clone(),
                self.name(),
            )?)),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "openai",
            Provider::Ollama { .. } => "ollama",
        }
    }

    /// Model identifier this provider will be asked for
    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }

    /// Endpoint the client will talk to
    pub fn endpoint(&self) -> String {
        match self {
            Provider::OpenAI { api_base, .. } => api_base.clone(),
            Provider::Ollama { base_url, .. } => format!("{}/v1", base_url.trim_end_matches('/')),
        }
    }

    /// Resolve a model entry against its provider entry
    pub fn from_config(
        model: &ModelConfig,
        provider: &ProviderConfig,
        config: &DeepdiveConfig,
    ) -> Result<Self> {
        let params = ModelParams::from(model);
        match provider {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
            } => {
                let api_key = config.resolve_env(api_key_env).ok_or_else(|| {
                    AppError::Config(format!(
                        "Environment variable '{}' is not set",
                        api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.model.clone(),
                    params,
                })
            }
            ProviderConfig::Ollama { base_url } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.model.clone(),
                params,
            }),
        }
    }
}

/// Pipeline stage a model is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Planner,
    Decomposer,
    Coordinator,
    Subagent,
}

impl ModelRole {
    pub const ALL: [ModelRole; 4] = [
        ModelRole::Planner,
        ModelRole::Decomposer,
        ModelRole::Coordinator,
        ModelRole::Subagent,
    ];

    /// Key of the `[models.*]` table for this role
    pub fn key(&self) -> &'static str {
        match self {
            ModelRole::Planner => "planner",
            ModelRole::Decomposer => "decomposer",
            ModelRole::Coordinator => "coordinator",
            ModelRole::Subagent => "subagent",
        }
    }
}

/// Configuration-based client factory
///
/// Resolves the `[models.<role>]` entry of the configuration to a provider and
/// builds a shareable client for it.
pub struct LLMClientFactory {
    config: Arc<DeepdiveConfig>,
}

impl LLMClientFactory {
    pub fn new(config: Arc<DeepdiveConfig>) -> Self {
        Self { config }
    }

    /// Resolve the provider configured for a pipeline role
    pub fn provider_for(&self, role: ModelRole) -> Result<Provider> {
        let model = self.config.models.get(role.key()).ok_or_else(|| {
            AppError::Config(format!("No model configured for '{}'", role.key()))
        })?;
        let provider = self.config.providers.get(&model.provider).ok_or_else(|| {
            AppError::Config(format!(
                "Provider '{}' referenced by model '{}' does not exist",
                model.provider,
                role.key()
            ))
        })?;
        Provider::from_config(model, provider, &self.config)
    }

    /// Create a client for a pipeline role
    pub fn create_for(&self, role: ModelRole) -> Result<Arc<dyn LLMClient>> {
        let provider = self.provider_for(role)?;
        tracing::debug!(
            role = role.key(),
            provider = provider.name(),
            model = provider.model(),
            endpoint = %provider.endpoint(),
            "creating LLM client"
        );
        Ok(Arc::from(provider.create_client()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubtaskList;

    #[test]
    fn test_provider_name_and_endpoint() {
        let ollama = Provider::Ollama {
            base_url: "http://localhost:11434/".to_string(),
            model: "llama3.2".to_string(),
            params: Default::default(),
        };
        assert_eq!(ollama.name(), "ollama");
        assert_eq!(ollama.model(), "llama3.2");
        assert_eq!(ollama.endpoint(), "http://localhost:11434/v1");

        let openai = Provider::OpenAI {
            api_key: "k".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            params: Default::default(),
        };
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_response_schema_for_subtask_list() {
        let schema = ResponseSchema::for_type::<SubtaskList>("subtaskList");
        assert_eq!(schema.name, "subtaskList");
        assert!(schema.strict);
        assert!(schema.schema.get("$schema").is_none());
        assert_eq!(schema.schema["type"], "object");
        assert!(schema.schema["properties"]["subtasks"].is_object());
        let rendered = schema.schema.to_string();
        assert!(rendered.contains("description"));
        assert!(rendered.contains("\"additionalProperties\":false"));
    }

    #[test]
    fn test_token_usage_add() {
        let total = TokenUsage::new(10, 5).add(&TokenUsage::new(1, 2));
        assert_eq!(total, TokenUsage::new(11, 7));
        assert_eq!(total.total_tokens, 18);
    }

    #[test]
    fn test_factory_resolves_roles() {
        let config = Arc::new(DeepdiveConfig::default());
        let factory = LLMClientFactory::new(config);
        for role in ModelRole::ALL {
            let provider = factory.provider_for(role).unwrap();
            assert_eq!(provider.name(), "ollama");
        }
        let client = factory.create_for(ModelRole::Planner).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_factory_missing_model() {
        let mut config = DeepdiveConfig::default();
        config.models.remove("subagent");
        let factory = LLMClientFactory::new(Arc::new(config));
        assert!(matches!(
            factory.provider_for(ModelRole::Subagent),
            Err(AppError::Config(_))
        ));
    }
}
