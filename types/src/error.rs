//! Failure taxonomy shared by every layer.
//!
//! Transport and HTTP failures are folded into [`ChatError`] at the client
//! boundary. The `Display` text of each kind is the fixed, user-facing message;
//! raw transport errors never make it into conversation history.

use thiserror::Error;

use crate::text::truncate_with_ellipsis;

const MAX_BACKEND_DETAIL_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("The requested document was not found. It may have been moved or deleted.")]
    NotFound,
    #[error("You don't have permission to access this resource.")]
    Forbidden,
    #[error("Authentication required. Please log in again.")]
    Unauthenticated,
    #[error("You have sent too many requests. Please try again later.")]
    RateLimited,
    #[error("The server ran into a problem. Please try again later.")]
    ServerError,
    #[error("Network error occurred. Please check your connection and try again.")]
    NetworkError,
    #[error("The requested file is not a PDF document.")]
    InvalidArtifact,
    #[error("Sorry, I couldn't work out which board game you're asking about.")]
    Unresolvable,
    #[error("{0}")]
    BackendError(String),
}

/// Discriminant of [`ChatError`], for matching and logging without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthenticated,
    RateLimited,
    ServerError,
    NetworkError,
    InvalidArtifact,
    Unresolvable,
    BackendError,
}

impl ChatError {
    /// Build a `BackendError` from backend-supplied text.
    ///
    /// Empty text falls back to a generic message; long text is truncated.
    #[must_use]
    pub fn backend(message: impl AsRef<str>) -> Self {
        let message = message.as_ref().trim();
        if message.is_empty() {
            return Self::BackendError(
                "An error occurred while processing your question.".to_string(),
            );
        }
        Self::BackendError(truncate_with_ellipsis(message, MAX_BACKEND_DETAIL_CHARS))
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::ServerError => ErrorKind::ServerError,
            Self::NetworkError => ErrorKind::NetworkError,
            Self::InvalidArtifact => ErrorKind::InvalidArtifact,
            Self::Unresolvable => ErrorKind::Unresolvable,
            Self::BackendError(_) => ErrorKind::BackendError,
        }
    }

    /// Classify a non-success HTTP status.
    ///
    /// `body_message` is the `error` field of the response body, if any; it is
    /// only surfaced for statuses outside the fixed taxonomy.
    #[must_use]
    pub fn from_status(status: u16, body_message: Option<&str>) -> Self {
        match status {
            401 => Self::Unauthenticated,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::backend(
                body_message
                    .filter(|m| !m.trim().is_empty())
                    .map_or_else(|| format!("Request failed ({status})."), str::to_string),
            ),
        }
    }
}
