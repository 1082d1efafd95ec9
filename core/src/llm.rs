use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::LlmSettings;
use crate::error::LlmError;

/// A selectable tool as the model sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// One tool-selection round trip.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub prompt: &'a str,
    pub tools: &'a [ToolDefinition],
    pub temperature: f32,
}

/// The tool the model picked, with its arguments already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSelection {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// The single-turn language-model completion boundary.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Offers `tools` to the model and returns the first one it chose, if any.
    async fn select_tool(
        &self,
        request: SelectionRequest<'_>,
    ) -> Result<Option<ToolSelection>, LlmError>;

    /// Plain text completion over a fixed message list.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Decodes the raw argument string a tool call arrives with.
///
/// Models sometimes send an empty string or `null` for argument-less tools;
/// both mean "no arguments".
pub fn parse_arguments(name: &str, raw: &str) -> Result<Map<String, Value>, LlmError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(raw).map_err(|e| LlmError::MalformedToolCall {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(LlmError::MalformedToolCall {
            name: name.to_string(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

/// OpenAI-backed completion client.
///
/// Tool selection and answer writing may run on different models.
pub struct Brain {
    client: Client<OpenAIConfig>,
    resolver_model: String,
    answer_model: String,
}

impl Brain {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let mut config = OpenAIConfig::new().with_api_key(settings.api_key.clone());
        if let Some(base) = &settings.api_base {
            config = config.with_api_base(base.clone());
        }

        // Rate-limit errors surface to the caller instead of being retried here.
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(OpenAIError::Reqwest)?;
        let client = Client::with_config(config).with_http_client(http).with_backoff(no_retry);

        info!(
            resolver_model = %settings.resolver_model,
            answer_model = %settings.answer_model,
            timeout_secs = settings.timeout.as_secs(),
            "Brain connected"
        );
        Ok(Self {
            client,
            resolver_model: settings.resolver_model.clone(),
            answer_model: settings.answer_model.clone(),
        })
    }

    /// Connectivity check run once at startup.
    pub async fn say_hello(&self) -> Result<String, LlmError> {
        self.complete(&[ChatMessage::user("Hello! Reply with 'System Online'.")]).await
    }

    fn to_openai_messages(
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| -> Result<ChatCompletionRequestMessage, LlmError> {
                let message = match m.role {
                    Role::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(m.content.as_str())
                            .build()?,
                    ),
                    Role::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(m.content.as_str())
                            .build()?,
                    ),
                };
                Ok(message)
            })
            .collect()
    }

    fn to_openai_tools(tools: &[ToolDefinition]) -> Result<Vec<ChatCompletionTool>, LlmError> {
        tools
            .iter()
            .map(|t| -> Result<ChatCompletionTool, LlmError> {
                let function = FunctionObjectArgs::default()
                    .name(&t.name)
                    .description(&t.description)
                    .parameters(t.parameters.clone())
                    .build()?;
                let tool = ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()?;
                Ok(tool)
            })
            .collect()
    }
}

#[async_trait]
impl CompletionService for Brain {
    async fn select_tool(
        &self,
        request: SelectionRequest<'_>,
    ) -> Result<Option<ToolSelection>, LlmError> {
        let openai_tools = Self::to_openai_tools(request.tools)?;
        let messages = Self::to_openai_messages(&[ChatMessage::user(request.prompt)])?;

        let body = CreateChatCompletionRequestArgs::default()
            .model(&self.resolver_model)
            .messages(messages)
            .tools(openai_tools)
            .temperature(request.temperature)
            .build()?;

        let response = self.client.chat().create(body).await?;
        let Some(choice) = response.choices.first() else {
            return Err(LlmError::EmptyResponse);
        };

        let first_call = choice.message.tool_calls.as_ref().and_then(|calls| calls.first());
        match first_call {
            Some(call) => {
                debug!(tool = %call.function.name, arguments = %call.function.arguments, "model selected a tool");
                let arguments = parse_arguments(&call.function.name, &call.function.arguments)?;
                Ok(Some(ToolSelection { name: call.function.name.clone(), arguments }))
            }
            None => Ok(None),
        }
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = CreateChatCompletionRequestArgs::default()
            .model(&self.answer_model)
            .messages(Self::to_openai_messages(messages)?)
            .build()?;

        let response = self.client.chat().create(body).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}
