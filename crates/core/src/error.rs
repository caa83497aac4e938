//! Error types for the Tessera domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the layer that owns a
//! context decides whether its errors propagate or get contained.

use thiserror::Error;

/// The top-level error type for all Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Filesystem errors ---
    #[error("Filesystem error: {0}")]
    Vfs(#[from] VfsError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// --- Bounded context errors ---

/// Transport-level failures talking to a model provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Failures inside the tool layer. These never cross the dispatch boundary:
/// the executor turns them into `{error}` results for the model.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Syntax error in {path}: {message}")]
    Syntax { path: String, message: String },

    #[error("{0}")]
    Vfs(#[from] VfsError),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Virtual filesystem errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Path collision at '{path}': '{segment}' is a file, not a directory")]
    PathCollision { path: String, segment: String },

    #[error("'{0}' is a directory")]
    IsDirectory(String),

    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl VfsError {
    /// Whether this error means "nothing at that path".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
