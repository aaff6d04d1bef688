//! OpenAI-compatible chat completions client
//!
//! Talks to any endpoint implementing `POST {api_base}/chat/completions`:
//! plain completions, `response_format: json_schema`, tool calling and
//! Server-Sent Events streaming.

use crate::llm::client::{
    LLMClient, LLMResponse, ModelParams, ResponseSchema, TextStream, TokenUsage,
};
use crate::llm::coordinator::{ConversationMessage, MessageRole};
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, FunctionCall, FunctionObject, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout; research turns with long contexts can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 600;

pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
    params: ModelParams,
    provider: &'static str,
}

impl OpenAIClient {
    pub fn new(
        api_key: Option<String>,
        api_base: String,
        model: String,
        params: ModelParams,
        provider: &'static str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build HTTP client: {}", e)))?;

        // An unset key must not fall back to OPENAI_API_KEY from the environment
        let config = OpenAIConfig::new()
            .with_api_key(api_key.unwrap_or_default())
            .with_api_base(api_base.trim_end_matches('/'));

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            model,
            params,
            provider,
        })
    }

    /// Request builder with the model and sampling parameters applied
    #[allow(deprecated)]
    fn request_args(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> CreateChatCompletionRequestArgs {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if let Some(temperature) = self.params.temperature {
            args.temperature(temperature);
        }
        if let Some(max_tokens) = self.params.max_tokens {
            args.max_tokens(max_tokens);
        }
        args
    }

    async fn complete(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse> {
        debug!(
            model = %self.model,
            provider = self.provider,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        self.client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.api_error(e))
    }

    fn api_error(&self, e: OpenAIError) -> AppError {
        AppError::LLM(format!("{} API error: {}", self.provider, e))
    }
}

fn build_error(e: OpenAIError) -> AppError {
    AppError::LLM(format!("Failed to build request: {}", e))
}

fn system_and_user(system: &str, prompt: &str) -> Vec<ChatCompletionRequestMessage> {
    vec![
        ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(
            system.to_string(),
        )),
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(
            prompt.to_string(),
        )),
    ]
}

/// Convert a conversation message to a chat completions request message
fn to_request_message(message: &ConversationMessage) -> Result<ChatCompletionRequestMessage> {
    let converted = match message.role {
        MessageRole::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage::from(message.content.clone()),
        ),
        MessageRole::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage::from(message.content.clone()),
        ),
        MessageRole::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            args.content(message.content.clone());
            if !message.tool_calls.is_empty() {
                args.tool_calls(
                    message
                        .tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            args.build().map_err(build_error)?.into()
        }
        MessageRole::Tool => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
            .content(message.content.clone())
            .build()
            .map_err(build_error)?
            .into(),
    };
    Ok(converted)
}

fn to_openai_tool(tool: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: tool.name.clone(),
            description: Some(tool.description.clone()),
            parameters: Some(tool.parameters.clone()),
            strict: None,
        },
    }
}

/// Decode the argument string of a requested tool call.
///
/// Text that is not JSON is kept as a `Value::String` so the tool loop can
/// report it back to the model instead of running the tool with no arguments.
fn parse_arguments(tool: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(tool, raw, error = %e, "tool call arguments are not valid JSON");
            Value::String(raw.to_string())
        }
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let request = self
            .request_args(system_and_user(system, prompt))
            .build()
            .map_err(build_error)?;

        self.complete(request)
            .await?
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::LLM(format!("No response from {}", self.provider)))
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        let request = self
            .request_args(system_and_user(system, prompt))
            .build()
            .map_err(build_error)?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| self.api_error(e))?;

        let result_stream = async_stream::stream! {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(response) => {
                        for choice in response.choices {
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    yield Ok(content);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AppError::LLM(format!("Stream error: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(result_stream)))
    }

    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Option<String>> {
        let request = self
            .request_args(system_and_user(system, prompt))
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: schema.name.clone(),
                    schema: Some(schema.schema.clone()),
                    strict: Some(schema.strict),
                },
            })
            .build()
            .map_err(build_error)?;

        Ok(self
            .complete(request)
            .await?
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }

    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut args = self.request_args(messages);
        if !tools.is_empty() {
            args.tools(tools.iter().map(to_openai_tool).collect::<Vec<_>>())
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }
        let request = args.build().map_err(build_error)?;

        let response = self.complete(request).await?;
        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLM(format!("No response from {}", self.provider)))?;

        let finish_reason = choice
            .finish_reason
            .and_then(|r| serde_json::to_value(r).ok())
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                arguments: parse_arguments(&call.function.name, &call.function.arguments),
                id: call.id,
                name: call.function.name,
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason,
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider
    }
}
