//! Core engine for bgchat - the chat session state machine.
//!
//! This crate contains the session, its collaborators (notice announcer, game
//! resolver, citation document cache) and configuration loading. It has no
//! terminal dependencies; the binary drives it.

mod announcer;
mod artifacts;
mod config;
mod known_games;
mod resolver;
mod session;

#[cfg(test)]
mod test_support;

pub use bgchat_client::{self, Backend, BackendConfig, HttpBackend};
pub use bgchat_types::{
    ChatError, Citation, CitationRef, CitationTarget, ErrorKind, GameId, Message, Role, citations,
    document_citations,
};

pub use announcer::{DEFAULT_ANNOUNCE_GAP, ErrorAnnouncer, Notice, NoticeSink};
pub use artifacts::{ArtifactCache, ArtifactHandle};
pub use config::{BgchatConfig, ConfigError, config_path, expand_env_vars};
pub use known_games::KnownGames;
pub use resolver::{
    ADVISORY_TEXT, DEFAULT_ADVISORY_CHUNK_CHARS, DEFAULT_ADVISORY_DELAY, GameResolver, Resolution,
    UNKNOWN_GAME, advisory_chunks, stream_advisory,
};
pub use session::{
    ChatSession, RemoteOperation, SessionError, SessionEvent, SessionSettings, SessionState,
    StreamHandle, TurnOutcome,
};
