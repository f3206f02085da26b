//! Core domain types for bgchat.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod citation;
mod error;
mod message;
mod text;

pub use citation::{Citation, CitationRef, CitationTarget, citations, document_citations};
pub use error::{ChatError, ErrorKind};
pub use message::{Message, Role, persisted_index};
pub use text::{char_chunks, truncate_with_ellipsis};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Game identifiers
// ============================================================================

/// Opaque board-game identifier, exactly as the backend spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

#[derive(Debug, Error)]
#[error("game identifier must not be empty")]
pub struct EmptyGameIdError;

impl GameId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyGameIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyGameIdError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this identifier is one of `known`.
    #[must_use]
    pub fn is_member_of(&self, known: &[GameId]) -> bool {
        known.contains(self)
    }
}

impl TryFrom<String> for GameId {
    type Error = EmptyGameIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for GameId {
    type Error = EmptyGameIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GameId> for String {
    fn from(value: GameId) -> Self {
        value.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GameId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
