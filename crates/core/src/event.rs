//! Agent event system: progress notifications for the UI/session layer.
//!
//! The orchestrator publishes an event whenever a tool starts or finishes
//! and when a run ends. Listeners either subscribe to the broadcast
//! `EventBus` or implement `ToolObserver` for direct callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::tool::{ToolArguments, ToolResult};

/// All events emitted by orchestration runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A tool call is about to be dispatched
    ToolStarted {
        agent_id: String,
        call_id: String,
        tool_name: String,
        arguments: ToolArguments,
        timestamp: DateTime<Utc>,
    },

    /// A tool call finished (successfully or with an `{error}` result)
    ToolFinished {
        agent_id: String,
        call_id: String,
        tool_name: String,
        result: ToolResult,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// One provider round-trip completed
    TurnCompleted {
        agent_id: String,
        turn: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A run reached a terminal state ("done", "aborted", "failed")
    Finished {
        agent_id: String,
        outcome: String,
        turns: u32,
        timestamp: DateTime<Utc>,
    },
}

/// Direct callbacks around tool execution (`onToolStart` / `onToolEnd`).
pub trait ToolObserver: Send + Sync {
    fn on_tool_start(&self, agent_id: &str, tool_name: &str, arguments: &ToolArguments);
    fn on_tool_end(&self, agent_id: &str, tool_name: &str, result: &ToolResult);
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
