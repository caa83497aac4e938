//! Conversation message domain types.
//!
//! A conversation is an ordered list of messages; order is insertion order.
//! Timestamps exist only so the histories of several agents can be merged
//! into one chat view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (tool results are sent back under this role too)
    User,
    /// The language model
    Model,
    /// System instructions
    System,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Inline image, base64 encoded.
    Image { mime_type: String, data: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// A single message in an agent's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// Ordered content parts
    pub parts: Vec<ContentPart>,

    /// Wall-clock time, used only for cross-agent merging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Whether this message carries tool output rather than prose
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_tool_output: bool,
}

impl ConversationMessage {
    fn with_role(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts,
            timestamp: Some(Utc::now()),
            is_tool_output: false,
        }
    }

    /// Create a new user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, vec![ContentPart::text(text)])
    }

    /// Create a user message with text followed by attached images.
    pub fn user_with_images(text: impl Into<String>, images: Vec<ContentPart>) -> Self {
        let mut parts = vec![ContentPart::text(text)];
        parts.extend(images);
        Self::with_role(Role::User, parts)
    }

    /// Create a new model message.
    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role(Role::Model, vec![ContentPart::text(text)])
    }

    /// Create a new system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(Role::System, vec![ContentPart::text(text)])
    }

    /// Create a message holding tool output.
    pub fn tool_output(text: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::User, vec![ContentPart::text(text)]);
        msg.is_tool_output = true;
        msg
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Image parts of this message.
    pub fn images(&self) -> impl Iterator<Item = &ContentPart> {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::Image { .. }))
    }

    /// Serialized size in characters, the unit of the context budget.
    pub fn serialized_len(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

/// Merge several agents' histories into one timeline.
///
/// The merge is stable: a message without a timestamp sorts as if it had
/// the timestamp of the message before it in its own history.
pub fn merge_by_timestamp(histories: &[Vec<ConversationMessage>]) -> Vec<ConversationMessage> {
    let mut keyed: Vec<(Option<DateTime<Utc>>, usize, usize, &ConversationMessage)> = Vec::new();
    for (h, history) in histories.iter().enumerate() {
        let mut last_seen = None;
        for (i, msg) in history.iter().enumerate() {
            if msg.timestamp.is_some() {
                last_seen = msg.timestamp;
            }
            keyed.push((last_seen, h, i, msg));
        }
    }
    keyed.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    keyed.into_iter().map(|(_, _, _, m)| m.clone()).collect()
}
