//! Client for the board-game rules backend.
//!
//! # Architecture
//!
//! - [`Backend`] - the seam the session engine talks through
//! - [`HttpBackend`] - reqwest implementation of [`Backend`]
//! - [`frame`] - incremental decoding of the streamed answer body
//!
//! # Error Handling
//!
//! Every operation returns [`ChatError`]. HTTP statuses are classified with
//! [`ChatError::from_status`]; transport failures, including idle streams,
//! become [`ChatError::NetworkError`]. Raw transport errors are logged, never
//! returned.
//!
//! | Endpoint | Method | Body |
//! |----------|--------|------|
//! | `known-board-games` | GET | - |
//! | `message-history` | POST | `{"board_game"}` |
//! | `delete-messages-from-index` | POST | `{"board_game","index"}` |
//! | `clear-message-history` | POST | `{"board_game"}` |
//! | `determine-board-game` | POST | `{"question"}` |
//! | `ask-question` | POST | `{"question","board_game"}` (streamed reply) |
//! | `pdfs/<path>` | GET | - |

pub mod frame;
mod http;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

pub use bgchat_types;
pub use bgchat_types::{ChatError, GameId, Message};
pub use frame::{FrameDecoder, FrameEvent, FrameStream, decode_frames};
pub use http::{BackendConfig, BackendConfigError, HttpBackend, read_capped_error_body};

/// Future returned by [`Backend`] operations.
pub type BackendFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChatError>> + Send + 'a>>;

/// Raw answer body, read by read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// A fetched document body with its declared media type.
#[derive(Debug, Clone)]
pub struct Document {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Operations offered by the rules backend.
///
/// Implementations are shared between the session and its background tasks,
/// so they must be cheap to call concurrently.
pub trait Backend: Send + Sync {
    fn known_games(&self) -> BackendFut<'_, Vec<GameId>>;

    fn message_history<'a>(&'a self, game: &'a GameId) -> BackendFut<'a, Vec<Message>>;

    /// Remove persisted messages at `index` and after.
    fn delete_from<'a>(&'a self, game: &'a GameId, index: usize) -> BackendFut<'a, ()>;

    fn clear_history<'a>(&'a self, game: &'a GameId) -> BackendFut<'a, ()>;

    /// Ask the backend which game `question` is about.
    ///
    /// Returns the raw answer; it may be `UNKNOWN` or a name outside the
    /// known-games list.
    fn determine_game<'a>(&'a self, question: &'a str) -> BackendFut<'a, String>;

    /// Start an answer stream. Resolves once response headers are in.
    fn ask<'a>(&'a self, game: &'a GameId, question: &'a str) -> BackendFut<'a, ByteStream>;

    fn fetch_document<'a>(&'a self, path: &'a str) -> BackendFut<'a, Document>;
}
