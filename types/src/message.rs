//! Conversation message model.
//!
//! A conversation is an ordered `Vec<Message>`. An Assistant message with empty
//! content is a *placeholder*: it only exists while the stream that fills it is
//! in flight.

use serde::{Deserialize, Serialize};

use crate::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    /// Whether the backend holds a copy of this message in its persisted
    /// history. Only messages that arrive from the backend default to `true`.
    #[serde(skip, default = "persisted_default")]
    persisted: bool,
}

const fn persisted_default() -> bool {
    true
}

// Equality is about what the user sees; persistence is bookkeeping.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role && self.content == other.content
    }
}

impl Eq for Message {}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::local(Role::User, content.into())
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::local(Role::Assistant, content.into())
    }

    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self::local(Role::Error, content.into())
    }

    /// An empty Assistant message awaiting streamed content.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::local(Role::Assistant, String::new())
    }

    #[must_use]
    pub fn from_failure(error: &ChatError) -> Self {
        Self::error(error.to_string())
    }

    fn local(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            persisted: false,
        }
    }

    /// Mark the message as mirrored by the backend's persisted history.
    #[must_use]
    pub fn into_persisted(mut self) -> Self {
        self.persisted = true;
        self
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.content.is_empty()
    }

    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    pub fn mark_persisted(&mut self) {
        self.persisted = true;
    }
}

/// Number of persisted messages in `history[..index]`.
///
/// The backend only stores exchanges that completed, so local indices drift from
/// backend indices whenever errors or advisory replies sit in between.
#[must_use]
pub fn persisted_index(history: &[Message], index: usize) -> usize {
    history
        .iter()
        .take(index)
        .filter(|message| message.is_persisted())
        .count()
}
