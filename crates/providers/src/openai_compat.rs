//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, DeepSeek, Groq, Mistral, Ollama, and
//! any endpoint exposing `/chat/completions`.
//!
//! The endpoint is stateless, so `OpenAiChat` keeps the flat message list
//! (system, prior turns, assistant tool calls, `role: "tool"` results) and
//! re-sends all of it on every turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_core::agent::ProviderKind;
use tessera_core::error::ProviderError;
use tessera_core::message::{ContentPart, ConversationMessage, Role};
use tessera_core::provider::*;
use tessera_core::tool::{ToolArguments, ToolCall};
use tracing::{debug, trace};

use crate::transport::{http_client, read_json, send_error};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of LLM providers since most expose
/// an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    kind: ProviderKind,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(kind: ProviderKind, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: kind.as_str().into(),
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http_client(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Create a provider on the kind's well-known endpoint.
    pub fn for_kind(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self::new(kind, kind.default_base_url(), api_key)
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::OpenRouter, api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::OpenAi, api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            ProviderKind::Ollama,
            base_url.unwrap_or(ProviderKind::Ollama.default_base_url()),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert history to the flat chat-completion message list.
    fn to_api_messages(system: Option<&str>, history: &[ConversationMessage]) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
            messages.push(ApiMessage::text("system", system));
        }
        for m in history {
            let role = match m.role {
                Role::User => "user",
                Role::Model => "assistant",
                Role::System => "system",
            };
            messages.push(ApiMessage {
                role: role.into(),
                content: Some(ApiContent::from_parts(&m.parts)),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        messages
    }

    fn request_body(
        model: &str,
        messages: &[ApiMessage],
        tools: &[serde_json::Value],
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "stream": false,
        });

        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(tools);
        }

        body
    }
}

async fn post_completion(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    provider: &str,
    body: &serde_json::Value,
) -> Result<ApiResponse, ProviderError> {
    let url = format!("{base_url}/chat/completions");
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(send_error)?;
    read_json(response, provider).await
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn open_chat(&self, request: ChatRequest) -> Box<dyn ChatSession> {
        Box::new(OpenAiChat {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            provider: self.name.clone(),
            messages: Self::to_api_messages(request.system_instruction.as_deref(), &request.history),
            tools: request.tools.iter().map(ToolDefinition::to_openai_tool).collect(),
            model: request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            turn: 0,
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedContent, ProviderError> {
        let mut messages = Self::to_api_messages(request.system_instruction.as_deref(), &request.history);
        messages.push(ApiMessage {
            role: "user".into(),
            content: Some(ApiContent::from_parts(&request.prompt)),
            tool_calls: None,
            tool_call_id: None,
        });

        let mut body = Self::request_body(
            &request.model,
            &messages,
            &[],
            request.temperature,
            request.max_tokens,
        );
        if request.json_output {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let api_response =
            post_completion(&self.client, &self.base_url, &self.api_key, &self.name, &body).await?;
        let (message, usage) = first_choice(api_response)?;

        Ok(GeneratedContent {
            text: message.content.map(|c| c.into_text()).unwrap_or_default(),
            media: Vec::new(),
            usage,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(send_error)?;
        let body: serde_json::Value = read_json(response, &self.name).await?;
        Ok(parse_model_list(&body))
    }
}

/// A stateless endpoint made stateful: the session owns the message list.
struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    provider: String,
    model: String,
    messages: Vec<ApiMessage>,
    tools: Vec<serde_json::Value>,
    temperature: f32,
    max_tokens: Option<u32>,
    turn: usize,
}

impl OpenAiChat {
    fn append_input(&mut self, input: TurnInput) -> usize {
        let before = self.messages.len();
        match input {
            TurnInput::User(parts) => self.messages.push(ApiMessage {
                role: "user".into(),
                content: Some(ApiContent::from_parts(&parts)),
                tool_calls: None,
                tool_call_id: None,
            }),
            TurnInput::ToolResults(outcomes) => {
                for outcome in outcomes {
                    self.messages.push(ApiMessage {
                        role: "tool".into(),
                        content: Some(ApiContent::Text(outcome.result.to_json().to_string())),
                        tool_calls: None,
                        tool_call_id: Some(outcome.call.id),
                    });
                }
            }
        }
        before
    }
}

#[async_trait]
impl ChatSession for OpenAiChat {
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, ProviderError> {
        let rollback = self.append_input(input);
        let body = OpenAiCompatProvider::request_body(
            &self.model,
            &self.messages,
            &self.tools,
            self.temperature,
            self.max_tokens,
        );

        debug!(
            provider = %self.provider,
            model = %self.model,
            turn = self.turn,
            messages = self.messages.len(),
            "Sending chat turn"
        );

        let result = post_completion(&self.client, &self.base_url, &self.api_key, &self.provider, &body)
            .await
            .and_then(first_choice);

        let (mut message, usage) = match result {
            Ok(ok) => ok,
            Err(e) => {
                self.messages.truncate(rollback);
                return Err(e);
            }
        };

        let turn = self.turn;
        let mut tool_calls = Vec::new();
        for (n, tc) in message.tool_calls.iter_mut().flatten().enumerate() {
            if tc.id.is_empty() {
                tc.id = format!("call_{turn}_{n}");
            }
            tool_calls.push(ToolCall {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                arguments: ToolArguments::parse_lenient(&tc.function.arguments),
            });
        }
        trace!(tool_calls = tool_calls.len(), "Completion parsed");

        let text = message.content.clone().map(|c| c.into_text()).unwrap_or_default();
        // Echo the assistant message back verbatim on the next request
        message.role = "assistant".into();
        self.messages.push(message);
        self.turn += 1;

        Ok(ModelTurn {
            text,
            tool_calls,
            media: Vec::new(),
            usage,
        })
    }
}

fn first_choice(api_response: ApiResponse) -> Result<(ApiMessage, Option<Usage>), ProviderError> {
    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;
    Ok((choice.message, usage))
}

fn parse_model_list(body: &serde_json::Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|m| m["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<ApiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(ApiContent::Text(text.into())),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Plain text, or multi-part content when images are attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

impl ApiContent {
    fn from_parts(parts: &[ContentPart]) -> Self {
        if parts.iter().all(|p| p.as_text().is_some()) {
            let text: Vec<&str> = parts.iter().filter_map(ContentPart::as_text).collect();
            return Self::Text(text.join("\n"));
        }
        Self::Parts(
            parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => ApiContentPart::Text { text: text.clone() },
                    ContentPart::Image { mime_type, data } => ApiContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{mime_type};base64,{data}"),
                        },
                    },
                })
                .collect(),
        )
    }

    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts
                .into_iter()
                .filter_map(|p| match p {
                    ApiContentPart::Text { text } => Some(text),
                    ApiContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    /// A JSON document encoded as a string
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
