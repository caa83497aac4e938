//! Gemini native provider implementation.
//!
//! Uses the `generateContent` API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - System instruction as a top-level field
//! - Native function calling with `functionCall` / `functionResponse` parts
//! - Inline image input and output (`inlineData`)
//! - JSON output mode and mixed text+image output for creative mode

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tessera_core::agent::ProviderKind;
use tessera_core::error::ProviderError;
use tessera_core::message::{ContentPart, ConversationMessage, Role};
use tessera_core::provider::*;
use tessera_core::tool::{ToolArguments, ToolCall, ToolResult};
use tracing::{debug, trace};

use crate::transport::{http_client, read_json, send_error};

const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Gemini native `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: ProviderKind::Gemini.as_str().into(),
            base_url: ProviderKind::Gemini.default_base_url().into(),
            api_key: api_key.into(),
            client: http_client(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    /// Convert history into native contents. System messages are folded
    /// into the system instruction; adjacent same-role turns are merged.
    fn history_to_contents(history: &[ConversationMessage]) -> (Vec<Content>, Vec<String>) {
        let mut contents: Vec<Content> = Vec::new();
        let mut system = Vec::new();

        for msg in history {
            let role = match msg.role {
                Role::System => {
                    system.push(msg.text());
                    continue;
                }
                Role::User => "user",
                Role::Model => "model",
            };
            let parts: Vec<Part> = msg.parts.iter().map(Part::from_content).collect();
            if parts.is_empty() {
                continue;
            }
            match contents.last_mut() {
                Some(last) if last.role == role => last.parts.extend(parts),
                _ => contents.push(Content {
                    role: role.into(),
                    parts,
                }),
            }
        }

        (contents, system)
    }

    fn system_content(instruction: Option<&str>, extra: Vec<String>) -> Option<Content> {
        let mut texts: Vec<String> = instruction
            .filter(|s| !s.trim().is_empty())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default();
        texts.extend(extra.into_iter().filter(|s| !s.trim().is_empty()));
        if texts.is_empty() {
            return None;
        }
        Some(Content {
            role: String::new(),
            parts: vec![Part::text(texts.join("\n\n"))],
        })
    }

    /// Parse the model list endpoint: keep models that support
    /// `generateContent`, without the `models/` prefix.
    fn parse_model_list(body: &serde_json::Value) -> Vec<String> {
        body["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter(|m| {
                        m["supportedGenerationMethods"]
                            .as_array()
                            .is_none_or(|methods| methods.iter().any(|x| x == "generateContent"))
                    })
                    .filter_map(|m| m["name"].as_str())
                    .map(|n| n.strip_prefix("models/").unwrap_or(n).to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn open_chat(&self, request: ChatRequest) -> Box<dyn ChatSession> {
        let (contents, extra_system) = Self::history_to_contents(&request.history);
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolGroup {
                function_declarations: request
                    .tools
                    .iter()
                    .map(ToolDefinition::to_gemini_declaration)
                    .collect(),
            }]
        };

        Box::new(GeminiChat {
            client: self.client.clone(),
            url: self.endpoint(&request.model),
            api_key: self.api_key.clone(),
            model: request.model,
            system_instruction: Self::system_content(
                request.system_instruction.as_deref(),
                extra_system,
            ),
            tools,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                ..Default::default()
            },
            contents,
            native_ids: HashSet::new(),
            turn: 0,
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedContent, ProviderError> {
        let (mut contents, extra_system) = Self::history_to_contents(&request.history);
        contents.push(Content {
            role: "user".into(),
            parts: request.prompt.iter().map(Part::from_content).collect(),
        });

        let body = GenerateBody {
            contents: &contents,
            system_instruction: Self::system_content(
                request.system_instruction.as_deref(),
                extra_system,
            ),
            tools: Vec::new(),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request.json_output.then_some("application/json"),
                response_modalities: request.allow_media.then(|| vec!["TEXT", "IMAGE"]),
            },
        };

        debug!(provider = "gemini", model = %request.model, "Sending generate request");
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        let api_resp: GenerateResponse = read_json(response, "gemini").await?;
        let (_, turn) = parse_response(api_resp, 0)?;

        Ok(GeneratedContent {
            text: turn.text,
            media: turn.media,
            usage: turn.usage,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("pageSize", "200")])
            .send()
            .await
            .map_err(send_error)?;
        let body: serde_json::Value = read_json(response, "gemini").await?;
        Ok(Self::parse_model_list(&body))
    }
}

/// The native multi-turn chat object: accumulates `contents` across turns.
struct GeminiChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    system_instruction: Option<Content>,
    tools: Vec<ToolGroup>,
    generation_config: GenerationConfig,
    contents: Vec<Content>,
    /// Call ids that came from the wire (synthetic ids are never echoed)
    native_ids: HashSet<String>,
    turn: usize,
}

impl GeminiChat {
    fn input_to_content(&self, input: TurnInput) -> Content {
        let parts = match input {
            TurnInput::User(parts) => parts.iter().map(Part::from_content).collect(),
            TurnInput::ToolResults(outcomes) => outcomes
                .iter()
                .map(|o| {
                    let id = self.native_ids.contains(&o.call.id).then(|| o.call.id.clone());
                    function_response_part(id, &o.call.name, &o.result)
                })
                .collect(),
        };
        Content {
            role: "user".into(),
            parts,
        }
    }
}

#[async_trait]
impl ChatSession for GeminiChat {
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, ProviderError> {
        let content = self.input_to_content(input);
        self.contents.push(content);

        debug!(
            provider = "gemini",
            model = %self.model,
            turn = self.turn,
            contents = self.contents.len(),
            "Sending chat turn"
        );

        let result = async {
            let body = GenerateBody {
                contents: &self.contents,
                system_instruction: self.system_instruction.clone(),
                tools: self.tools.clone(),
                generation_config: self.generation_config.clone(),
            };
            let response = self
                .client
                .post(&self.url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(send_error)?;
            let api_resp: GenerateResponse = read_json(response, "gemini").await?;
            parse_response(api_resp, self.turn)
        }
        .await;

        match result {
            Ok((model_content, turn)) => {
                for call in &model_content.parts {
                    if let Some(id) = call.function_call.as_ref().and_then(|fc| fc.id.clone()) {
                        self.native_ids.insert(id);
                    }
                }
                trace!(tool_calls = turn.tool_calls.len(), "Gemini turn parsed");
                self.contents.push(model_content);
                self.turn += 1;
                Ok(turn)
            }
            Err(e) => {
                // Leave the history as it was before this turn
                self.contents.pop();
                Err(e)
            }
        }
    }
}

/// Tool results go back as `functionResponse` parts keyed by name. The
/// response field must be an object, so other payloads are wrapped.
fn function_response_part(id: Option<String>, name: &str, result: &ToolResult) -> Part {
    let response = match result.to_json() {
        serde_json::Value::Object(map) => serde_json::Value::Object(map),
        other => serde_json::json!({ "result": other }),
    };
    Part {
        function_response: Some(FunctionResponse {
            id,
            name: name.to_string(),
            response,
        }),
        ..Default::default()
    }
}

/// Extract the first candidate. Calls without ids get `call_<turn>_<n>`.
fn parse_response(resp: GenerateResponse, turn: usize) -> Result<(Content, ModelTurn), ProviderError> {
    let usage = resp.usage_metadata.map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    });

    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .as_ref()
            .and_then(|f| f["blockReason"].as_str())
            .unwrap_or("no candidates returned");
        return Err(ProviderError::MalformedResponse(format!("gemini: {reason}")));
    };

    let mut content = candidate.content.unwrap_or_default();
    if content.role.is_empty() {
        content.role = "model".into();
    }

    let mut model_turn = ModelTurn {
        usage,
        ..Default::default()
    };

    for part in &content.parts {
        if let Some(text) = &part.text
            && part.thought != Some(true)
        {
            model_turn.text.push_str(text);
        }
        if let Some(inline) = &part.inline_data {
            model_turn
                .media
                .push(ContentPart::image(&inline.mime_type, &inline.data));
        }
        if let Some(fc) = &part.function_call {
            let id = fc
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{turn}_{}", model_turn.tool_calls.len()));
            model_turn.tool_calls.push(ToolCall {
                id,
                name: fc.name.clone(),
                arguments: ToolArguments::from_json(&fc.args),
            });
        }
    }

    if model_turn.text.is_empty() && model_turn.tool_calls.is_empty() && model_turn.media.is_empty() {
        debug!(
            finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
            "Gemini returned an empty candidate"
        );
    }

    Ok((content, model_turn))
}

// --- Gemini API types ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

/// One part of a content; exactly one payload field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
    /// Opaque; must be echoed back with the part it arrived on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn from_content(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::text(text.clone()),
            ContentPart::Image { mime_type, data } => Self {
                inline_data: Some(InlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolGroup {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolGroup>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
