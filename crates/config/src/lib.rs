//! Configuration loading, validation, and management for Tessera.
//!
//! Loads configuration from `~/.tessera/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tessera_core::agent::{Agent, Credential, ProviderKind};

/// The root configuration structure.
///
/// Maps directly to `~/.tessera/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: ProviderKind,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Workspace mounting
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Agent loop limits
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Provider-specific configurations, keyed by provider kind
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Stored credentials
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,

    /// Configured agents
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Gemini
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("workspace", &self.workspace)
            .field("orchestrator", &self.orchestrator)
            .field("providers", &self.providers)
            .field("credentials", &self.credentials)
            .field("agents", &self.agents)
            .finish()
    }
}

/// Where agents read and write files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory to mount; absent or unreadable means an in-memory workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Directory names skipped by listing, search and indexing
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

fn default_excluded_dirs() -> Vec<String> {
    [
        "node_modules",
        ".git",
        "dist",
        "build",
        "target",
        ".next",
        "__pycache__",
        ".venv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

/// How tool calls of a single model turn are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolConcurrency {
    #[default]
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Model round-trips per user message before giving up
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Override for the per-provider history budget, in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_budget_chars: Option<usize>,

    #[serde(default)]
    pub tool_concurrency: ToolConcurrency,

    /// Seconds before `run_command` is killed
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_max_turns() -> u32 {
    5
}
fn default_command_timeout() -> u64 {
    60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            context_budget_chars: None,
            tool_concurrency: ToolConcurrency::default(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// A stored credential. The secret is taken from `secret`, then from the
/// environment variable named by `secret_env`, then from the provider's
/// `api_key`, then from the provider's well-known environment variable.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub id: String,
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("alias", &self.alias)
            .field("secret", &redact(&self.secret))
            .field("secret_env", &self.secret_env)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Id of the credential this agent uses
    pub credential: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Workspace subdirectory the agent is scoped to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_depth: Option<usize>,
    /// Whether this agent writes the multi-agent plan
    #[serde(default)]
    pub planner: bool,
}

/// Id given to the credential and agent synthesized when none are configured.
pub const DEFAULT_ID: &str = "default";

impl AppConfig {
    /// Load configuration from the default path (~/.tessera/config.toml).
    ///
    /// Environment overrides:
    /// - `TESSERA_PROVIDER` replaces `default_provider`
    /// - `TESSERA_MODEL` replaces `default_model`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(provider) = std::env::var("TESSERA_PROVIDER") {
            config.default_provider = provider
                .parse()
                .map_err(|e: String| ConfigError::ValidationError(e))?;
        }

        if let Ok(model) = std::env::var("TESSERA_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tessera")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.orchestrator.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_turns must be at least 1".into(),
            ));
        }

        for agent in &self.agents {
            if !self.credentials.iter().any(|c| c.id == agent.credential) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' references unknown credential '{}'",
                    agent.id, agent.credential
                )));
            }
            if let Some(t) = agent.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}': temperature must be between 0.0 and 2.0",
                    agent.id
                )));
            }
        }

        if self.agents.iter().filter(|a| a.planner).count() > 1 {
            return Err(ConfigError::ValidationError(
                "at most one agent may be the planner".into(),
            ));
        }

        Ok(())
    }

    /// Provider settings for a kind, if configured.
    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(kind.as_str())
    }

    /// Credentials with their secrets resolved. When none are configured a
    /// single `default` credential for `default_provider` is synthesized.
    pub fn resolve_credentials(&self) -> Vec<Credential> {
        if self.credentials.is_empty() {
            return vec![Credential {
                id: DEFAULT_ID.into(),
                provider: self.default_provider,
                secret: self.fallback_secret(self.default_provider).unwrap_or_default(),
                alias: String::new(),
            }];
        }

        self.credentials
            .iter()
            .map(|c| {
                let secret = c
                    .secret
                    .clone()
                    .or_else(|| c.secret_env.as_ref().and_then(|var| std::env::var(var).ok()))
                    .or_else(|| self.fallback_secret(c.provider));
                if secret.is_none() && c.provider != ProviderKind::Ollama {
                    tracing::warn!(credential = %c.id, provider = %c.provider, "Credential has no secret");
                }
                Credential {
                    id: c.id.clone(),
                    provider: c.provider,
                    secret: secret.unwrap_or_default(),
                    alias: c.alias.clone().unwrap_or_default(),
                }
            })
            .collect()
    }

    fn fallback_secret(&self, kind: ProviderKind) -> Option<String> {
        self.provider(kind)
            .and_then(|p| p.api_key.clone())
            .or_else(|| kind.api_key_env_var().and_then(|var| std::env::var(var).ok()))
    }

    /// Agents with defaults filled in. When none are configured a single
    /// `default` agent on the default credential is synthesized.
    pub fn resolve_agents(&self) -> Vec<Agent> {
        if self.agents.is_empty() {
            let credential = self
                .credentials
                .first()
                .map(|c| c.id.clone())
                .unwrap_or_else(|| DEFAULT_ID.into());
            let mut agent = Agent::new(DEFAULT_ID, credential, self.default_model.clone());
            agent.temperature = self.default_temperature;
            return vec![agent];
        }

        self.agents
            .iter()
            .map(|a| {
                let model = a
                    .model
                    .clone()
                    .or_else(|| {
                        self.credentials
                            .iter()
                            .find(|c| c.id == a.credential)
                            .and_then(|c| self.provider(c.provider))
                            .and_then(|p| p.default_model.clone())
                    })
                    .unwrap_or_else(|| self.default_model.clone());
                let mut agent = Agent::new(a.id.clone(), a.credential.clone(), model);
                if let Some(name) = &a.name {
                    agent.name = name.clone();
                }
                if let Some(root) = &a.workspace_root {
                    agent.workspace_root = root.clone();
                }
                agent.system_instruction = a.system_instruction.clone().unwrap_or_default();
                agent.temperature = a.temperature.unwrap_or(self.default_temperature);
                if let Some(depth) = a.history_depth {
                    agent.history_depth = depth;
                }
                agent
            })
            .collect()
    }

    /// Id of the agent that writes multi-agent plans: the configured
    /// planner, else the first agent.
    pub fn planner_id(&self) -> Option<String> {
        self.agents
            .iter()
            .find(|a| a.planner)
            .or_else(|| self.agents.first())
            .map(|a| a.id.clone())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            workspace: WorkspaceConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            providers: HashMap::new(),
            credentials: vec![],
            agents: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_provider = "openrouter"
default_model = "anthropic/claude-sonnet-4"

[workspace]
root = "/srv/project"

[orchestrator]
max_turns = 8
tool_concurrency = "sequential"

[providers.openrouter]
api_key = "sk-or-test"
default_model = "openai/gpt-4o"

[[credentials]]
id = "work"
provider = "openrouter"
alias = "Work key"

[[credentials]]
id = "local"
provider = "ollama"
secret = "unused"

[[agents]]
id = "frontend"
credential = "work"
workspace_root = "web"
planner = true

[[agents]]
id = "backend"
credential = "local"
model = "llama3.2"
temperature = 0.2
history_depth = 6
"#;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, ProviderKind::Gemini);
        assert_eq!(config.orchestrator.max_turns, 5);
        assert!(config.workspace.excluded_dirs.contains(&"node_modules".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.orchestrator.max_turns, config.orchestrator.max_turns);
    }

    #[test]
    fn full_config_parsing() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.default_provider, ProviderKind::OpenRouter);
        assert_eq!(config.workspace.root, Some(PathBuf::from("/srv/project")));
        assert_eq!(config.orchestrator.tool_concurrency, ToolConcurrency::Sequential);
        assert_eq!(config.planner_id().as_deref(), Some("frontend"));

        let creds = config.resolve_credentials();
        assert_eq!(creds.len(), 2);
        // Falls back to the provider section's key
        assert_eq!(creds[0].secret, "sk-or-test");
        assert_eq!(creds[1].secret, "unused");

        let agents = config.resolve_agents();
        assert_eq!(agents[0].model, "openai/gpt-4o");
        assert_eq!(agents[0].workspace_root, "web");
        assert_eq!(agents[1].model, "llama3.2");
        assert_eq!(agents[1].history_depth, 6);
        assert!((agents[1].temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_turns_rejected() {
        let mut config = AppConfig::default();
        config.orchestrator.max_turns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_credential_rejected() {
        let toml_str = r#"
[[agents]]
id = "a"
credential = "missing"
"#;
        let err = AppConfig::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("unknown credential"));
    }

    #[test]
    fn two_planners_rejected() {
        let toml_str = r#"
[[credentials]]
id = "c"
provider = "gemini"
secret = "k"

[[agents]]
id = "a"
credential = "c"
planner = true

[[agents]]
id = "b"
credential = "c"
planner = true
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn empty_config_synthesizes_default_agent() {
        let config = AppConfig::default();
        let creds = config.resolve_credentials();
        let agents = config.resolve_agents();
        assert_eq!(creds[0].id, DEFAULT_ID);
        assert_eq!(agents[0].credential_id, DEFAULT_ID);
        assert_eq!(agents[0].model, "gemini-2.5-flash");
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, ProviderKind::Gemini);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agents.len(), 2);

        std::fs::write(&path, "default_temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path.ends_with("config.toml")));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-or-test"));
        assert!(!debug.contains("unused"));
        assert!(debug.contains("[REDACTED]"));
    }
}
