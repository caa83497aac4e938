//! # Tessera Core
//!
//! Domain types, traits, and error definitions for the Tessera coding
//! assistant. This crate has **no transport or storage dependencies**: it
//! defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here; implementations live in their own crates:
//! - `Provider` / `ChatSession`: one internal tool-calling contract, one
//!   adapter per wire protocol (`tessera-providers`)
//! - Tool calls and results are plain data so the execution boundary
//!   (`tessera-tools`) can stay provider-agnostic

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, Credential, ProviderKind};
pub use error::{Error, ProviderError, ToolError, VfsError};
pub use event::{AgentEvent, EventBus, ToolObserver};
pub use message::{ContentPart, ConversationMessage, Role};
pub use provider::{
    ChatRequest, ChatSession, GenerateRequest, GeneratedContent, ModelTurn, Provider,
    ToolDefinition, ToolOutcome, TurnInput, Usage,
};
pub use tool::{ArgValue, ToolArguments, ToolCall, ToolResult};
