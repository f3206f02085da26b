use std::sync::Arc;
use std::time::Duration;

use bgchat_client::Backend;
use bgchat_types::{ChatError, GameId, char_chunks};

/// Sentinel the classification endpoint returns when it cannot decide.
pub const UNKNOWN_GAME: &str = "UNKNOWN";

/// Reply rendered locally when no game could be determined.
pub const ADVISORY_TEXT: &str = "I'm unable to determine which board game your question refers to. \
Please select one manually or try asking me another question.";

pub const DEFAULT_ADVISORY_CHUNK_CHARS: usize = 4;
pub const DEFAULT_ADVISORY_DELAY: Duration = Duration::from_millis(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(GameId),
    Unresolved,
}

/// Classifies free-text questions against the known games.
#[derive(Clone)]
pub struct GameResolver {
    backend: Arc<dyn Backend>,
}

impl GameResolver {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn determine(
        &self,
        question: &str,
        known_games: &[GameId],
    ) -> Result<Resolution, ChatError> {
        let answer = match self.backend.determine_game(question).await {
            Ok(answer) => answer,
            Err(ChatError::ServerError) => return Err(ChatError::Unresolvable),
            Err(e) => return Err(e),
        };
        Ok(interpret(&answer, known_games))
    }
}

fn interpret(answer: &str, known_games: &[GameId]) -> Resolution {
    let answer = answer.trim();
    if answer == UNKNOWN_GAME {
        tracing::debug!("Backend could not classify question");
        return Resolution::Unresolved;
    }
    match known_games.iter().find(|game| game.as_str() == answer) {
        Some(game) => {
            tracing::debug!(game = %game, "Resolved game from question");
            Resolution::Resolved(game.clone())
        }
        None => {
            tracing::debug!(answer, "Classification is not a known game");
            Resolution::Unresolved
        }
    }
}

/// The advisory text split into delivery increments.
#[must_use]
pub fn advisory_chunks(chunk_chars: usize) -> Vec<&'static str> {
    char_chunks(ADVISORY_TEXT, chunk_chars.max(1))
}

/// Deliver the advisory increment by increment, waiting `delay` before each.
///
/// Stops early when `emit` returns `false`. Returns whether every increment
/// was delivered.
pub async fn stream_advisory(
    chunk_chars: usize,
    delay: Duration,
    mut emit: impl FnMut(&'static str) -> bool,
) -> bool {
    for chunk in advisory_chunks(chunk_chars) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !emit(chunk) {
            return false;
        }
    }
    true
}
