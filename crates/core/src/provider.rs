//! Provider trait: the abstraction over LLM backends.
//!
//! Providers speak very different wire protocols: some expose a stateful
//! multi-turn chat object, others a stateless chat-completion endpoint.
//! Both are hidden behind one tool-calling contract:
//!
//! 1. `Provider::open_chat`: start a session with history + tool set
//! 2. `ChatSession::send(TurnInput::User(..))`: receive text or tool calls
//! 3. `ChatSession::send(TurnInput::ToolResults(..))`: continue
//!
//! The orchestrator only ever talks to this contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::ProviderKind;
use crate::error::ProviderError;
use crate::message::{ContentPart, ConversationMessage};
use crate::tool::{ToolCall, ToolResult};

/// A tool definition, in a wire-neutral form.
///
/// `parameters` is a JSON-schema object with lower-case types; adapters
/// convert it to their own representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// `{type: "function", function: {...}}` for chat-completion endpoints.
    pub fn to_openai_tool(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// A function declaration for the native protocol, whose schema types
    /// are upper-case (`OBJECT`, `STRING`, `ARRAY`).
    pub fn to_gemini_declaration(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": upper_case_types(&self.parameters),
        })
    }
}

fn upper_case_types(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let v = match (k.as_str(), v) {
                    ("type", serde_json::Value::String(t)) => {
                        serde_json::Value::String(t.to_ascii_uppercase())
                    }
                    _ => upper_case_types(v),
                };
                (k.clone(), v)
            })
            .collect::<serde_json::Map<_, _>>()
            .into(),
        serde_json::Value::Array(items) => items.iter().map(upper_case_types).collect(),
        other => other.clone(),
    }
}

/// Everything needed to open a tool-calling chat session.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The model to use (e.g., "gemini-2.5-flash", "gpt-4o")
    pub model: String,

    /// System instruction for the whole session
    pub system_instruction: Option<String>,

    /// Prior conversation, already pruned
    pub history: Vec<ConversationMessage>,

    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate per reply
    pub max_tokens: Option<u32>,
}

/// One input to a running chat session.
#[derive(Debug, Clone)]
pub enum TurnInput {
    /// A user turn (text and/or images)
    User(Vec<ContentPart>),
    /// Results for every tool call of the previous model turn
    ToolResults(Vec<ToolOutcome>),
}

/// A tool result correlated back to its originating call.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// One reply from the model.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    /// Free text of the reply (may be empty when only tools are requested)
    pub text: String,

    /// Requested tool calls; empty means the model is done
    pub tool_calls: Vec<ToolCall>,

    /// Inline generated media
    pub media: Vec<ContentPart>,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

impl ModelTurn {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single-shot generation request without tools (planning, creative mode).
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub history: Vec<ConversationMessage>,
    pub prompt: Vec<ContentPart>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON document (where supported)
    pub json_output: bool,
    /// Ask the provider for inline images alongside text (where supported)
    pub allow_media: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_instruction: None,
            history: Vec::new(),
            prompt: vec![ContentPart::text(prompt)],
            temperature: 0.7,
            max_tokens: None,
            json_output: false,
            allow_media: false,
        }
    }
}

/// Result of a single-shot generation.
#[derive(Debug, Clone, Default)]
pub struct GeneratedContent {
    pub text: String,
    pub media: Vec<ContentPart>,
    pub usage: Option<Usage>,
}

/// A live tool-calling conversation with one provider.
///
/// Implementations own their wire-format history: the native adapter keeps
/// the provider's structured contents, the completion adapter keeps a flat
/// message list it re-sends on every call.
#[async_trait]
pub trait ChatSession: Send {
    /// Send one input and wait for the model's reply.
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, ProviderError>;
}

/// The core Provider trait.
///
/// The orchestrator calls `open_chat()` / `generate()` without knowing which
/// wire protocol is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "openrouter").
    fn name(&self) -> &str;

    /// Which provider family this is.
    fn kind(&self) -> ProviderKind;

    /// Open a tool-calling chat session.
    fn open_chat(&self, request: ChatRequest) -> Box<dyn ChatSession>;

    /// Single-shot generation without tools.
    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedContent, ProviderError>;

    /// List available models.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .kind()
            .default_models()
            .iter()
            .map(|m| m.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_defaults() {
        let req = GenerateRequest::new("gpt-4o", "hi");
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(!req.json_output);
        assert_eq!(req.prompt.len(), 1);
    }

    #[test]
    fn model_turn_wants_tools() {
        let mut turn = ModelTurn::default();
        assert!(!turn.wants_tools());
        turn.tool_calls.push(ToolCall {
            id: "c1".into(),
            name: "read_file".into(),
            arguments: Default::default(),
        });
        assert!(turn.wants_tools());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "run_command".into(),
            description: "Execute a shell command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The command to run" }
                },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("run_command"));
        assert!(json.contains("command"));
    }

    #[test]
    fn wire_representations() {
        let tool = ToolDefinition {
            name: "search_files".into(),
            description: "Find files by name".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "paths": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["query"]
            }),
        };

        let openai = tool.to_openai_tool();
        assert_eq!(openai["type"], "function");
        assert_eq!(openai["function"]["parameters"]["type"], "object");

        let gemini = tool.to_gemini_declaration();
        assert_eq!(gemini["name"], "search_files");
        assert_eq!(gemini["parameters"]["type"], "OBJECT");
        assert_eq!(gemini["parameters"]["properties"]["query"]["type"], "STRING");
        assert_eq!(gemini["parameters"]["properties"]["paths"]["items"]["type"], "STRING");
        assert_eq!(gemini["parameters"]["required"][0], "query");
    }
}
