//! Agent, credential and provider-kind types.

use serde::{Deserialize, Serialize};

/// Provider families. `Gemini` speaks its native structured chat protocol;
/// every other kind is reached through an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    OpenRouter,
    DeepSeek,
    Groq,
    Mistral,
    Ollama,
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 8] = [
        Self::Gemini,
        Self::OpenAi,
        Self::OpenRouter,
        Self::DeepSeek,
        Self::Groq,
        Self::Mistral,
        Self::Ollama,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
            Self::Groq => "groq",
            Self::Mistral => "mistral",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }

    /// Whether this family uses the native (non OpenAI-compatible) protocol.
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Gemini)
    }

    /// Default API base URL.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::Ollama => "http://localhost:11434/v1",
            Self::Custom => "http://localhost:8000/v1",
        }
    }

    /// Environment variable consulted when a credential carries no secret.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Mistral => Some("MISTRAL_API_KEY"),
            Self::Ollama | Self::Custom => None,
        }
    }

    /// Static model list used when live listing fails.
    pub fn default_models(&self) -> &'static [&'static str] {
        match self {
            Self::Gemini => &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"],
            Self::OpenAi => &["gpt-4o", "gpt-4o-mini", "o3-mini"],
            Self::OpenRouter => &[
                "anthropic/claude-sonnet-4",
                "openai/gpt-4o",
                "google/gemini-2.5-flash",
            ],
            Self::DeepSeek => &["deepseek-chat", "deepseek-reasoner"],
            Self::Groq => &["llama-3.3-70b-versatile", "qwen-qwq-32b"],
            Self::Mistral => &["mistral-large-latest", "codestral-latest"],
            Self::Ollama => &["llama3.2", "qwen2.5-coder"],
            Self::Custom => &[],
        }
    }

    /// Conversation budget in serialized characters.
    pub fn context_budget_chars(&self) -> usize {
        match self {
            Self::Gemini => 400_000,
            Self::OpenAi | Self::OpenRouter | Self::Mistral => 200_000,
            Self::DeepSeek => 120_000,
            Self::Groq => 60_000,
            Self::Ollama | Self::Custom => 30_000,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider '{s}'"))
    }
}

/// A stored provider credential. Never mutated by the core.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub provider: ProviderKind,
    pub secret: String,
    #[serde(default)]
    pub alias: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("secret", &"[REDACTED]")
            .field("alias", &self.alias)
            .finish()
    }
}

/// A configured persona binding a credential, model and instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub credential_id: String,
    pub model: String,

    /// Slash path inside the workspace this agent works in ("" = root)
    #[serde(default)]
    pub workspace_root: String,

    #[serde(default)]
    pub system_instruction: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum number of history messages sent with each request
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_history_depth() -> usize {
    20
}

impl Agent {
    pub fn new(id: impl Into<String>, credential_id: impl Into<String>, model: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            credential_id: credential_id.into(),
            model: model.into(),
            workspace_root: String::new(),
            system_instruction: String::new(),
            temperature: default_temperature(),
            history_depth: default_history_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("openrouter".parse::<ProviderKind>().unwrap(), ProviderKind::OpenRouter);
        assert!("nope".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn only_gemini_is_native() {
        let native: Vec<_> = ProviderKind::ALL.iter().filter(|k| k.is_native()).collect();
        assert_eq!(native, vec![&ProviderKind::Gemini]);
    }

    #[test]
    fn credential_debug_redacts_secret() {
        let cred = Credential {
            id: "c1".into(),
            provider: ProviderKind::OpenAi,
            secret: "sk-very-secret".into(),
            alias: "work".into(),
        };
        let dbg = format!("{cred:?}");
        assert!(!dbg.contains("sk-very-secret"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn agent_defaults() {
        let agent = Agent::new("coder", "c1", "gpt-4o");
        assert_eq!(agent.name, "coder");
        assert_eq!(agent.history_depth, 20);
        assert!(agent.workspace_root.is_empty());
    }
}
