//! The chat session state machine.
//!
//! A [`ChatSession`] owns the conversation history and is the only thing that
//! mutates it. Network work runs in spawned tasks which report back over a
//! channel; the session applies those reports when the caller pumps it with
//! [`ChatSession::process_events`], [`ChatSession::next_event`] or
//! [`ChatSession::settle`].
//!
//! Every turn carries a generation number. Starting a new turn, selecting a
//! game or clearing the chat bumps the generation, and reports from older
//! generations are dropped on arrival.
//!
//! Remote history mutations (delete, clear) and history fetches are chained:
//! each waits for the previous one, and every turn waits for the latest one
//! before asking. The backend therefore sees them in the order the user
//! issued them.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::{mpsc, watch};

use bgchat_client::{Backend, FrameEvent, decode_frames};
use bgchat_types::{ChatError, CitationRef, GameId, Message, Role, persisted_index};

use crate::announcer::{DEFAULT_ANNOUNCE_GAP, ErrorAnnouncer, NoticeSink};
use crate::artifacts::{ArtifactCache, ArtifactHandle};
use crate::known_games::KnownGames;
use crate::resolver::{
    DEFAULT_ADVISORY_CHUNK_CHARS, DEFAULT_ADVISORY_DELAY, GameResolver, Resolution,
    stream_advisory,
};

const EMPTY_ANSWER: &str = "The assistant returned an empty answer.";
const UNSYNCED_EDIT: &str = "Earlier messages for this game could not be loaded, \
so the saved conversation was left unchanged.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub announce_gap: Duration,
    pub advisory_chunk_chars: usize,
    pub advisory_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            announce_gap: DEFAULT_ANNOUNCE_GAP,
            advisory_chunk_chars: DEFAULT_ADVISORY_CHUNK_CHARS,
            advisory_delay: DEFAULT_ADVISORY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Waiting for the backend to say which game the question is about.
    Resolving,
    Streaming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// No game could be determined; the advisory was rendered instead.
    Advisory,
    Failed(ChatError),
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    DeleteFrom(usize),
    Clear,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteFrom(index) => write!(f, "delete messages from {index}"),
            Self::Clear => f.write_str("clear history"),
        }
    }
}

/// Observable effect of applying a task report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    GameResolved(GameId),
    Unresolved,
    /// Text appended to the in-flight answer.
    Chunk(String),
    TurnFinished(TurnOutcome),
    HistoryLoaded { game: GameId, messages: usize },
    HistoryFailed { game: GameId, error: ChatError },
    RemoteFailed {
        operation: RemoteOperation,
        error: ChatError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("unknown board game: {0}")]
    UnknownGame(String),
    #[error("the list of known board games has not been loaded")]
    GamesNotLoaded,
    #[error("no message at index {index} (history has {len})")]
    InvalidIndex { index: usize, len: usize },
    #[error("message {0} is not a user message")]
    NotAUserMessage(usize),
    #[error("message {0} is not an error message")]
    NotAnErrorMessage(usize),
}

/// The in-flight turn.
#[derive(Debug)]
pub struct StreamHandle {
    generation: u64,
    placeholder: usize,
    abort: AbortHandle,
}

impl StreamHandle {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// History index of the Assistant message this turn writes into.
    #[must_use]
    pub const fn placeholder_index(&self) -> usize {
        self.placeholder
    }
}

enum TurnEnd {
    Completed,
    Advisory,
    Failed(ChatError),
}

enum TaskEvent {
    Resolved {
        generation: u64,
        game: GameId,
        remote_prefix: Option<usize>,
    },
    Unresolved {
        generation: u64,
    },
    Chunk {
        generation: u64,
        text: String,
    },
    TurnEnded {
        generation: u64,
        end: TurnEnd,
    },
    HistoryFetched {
        selection: u64,
        game: GameId,
        result: Result<Vec<Message>, ChatError>,
    },
    RemoteFailed {
        operation: RemoteOperation,
        error: ChatError,
    },
    TaskFinished,
}

/// Reports task completion even when the task is aborted.
struct TaskGuard(mpsc::UnboundedSender<TaskEvent>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let _ = self.0.send(TaskEvent::TaskFinished);
    }
}

type Barrier = Option<watch::Receiver<bool>>;

async fn wait_for(barrier: Barrier) {
    if let Some(mut done) = barrier {
        // A dropped sender means the predecessor is gone; either way we may go.
        let _ = done.wait_for(|finished| *finished).await;
    }
}

pub struct ChatSession {
    backend: Arc<dyn Backend>,
    resolver: GameResolver,
    known_games: KnownGames,
    announcer: ErrorAnnouncer,
    artifacts: ArtifactCache,
    settings: SessionSettings,

    selected_game: Option<GameId>,
    history: Vec<Message>,
    state: SessionState,
    last_outcome: Option<TurnOutcome>,

    generation: u64,
    selection: u64,
    /// Backend-persisted messages for the selected game that precede the
    /// local history. `None` while unknown.
    remote_prefix: Option<usize>,
    active: Option<StreamHandle>,
    barrier: Barrier,

    events_tx: mpsc::UnboundedSender<TaskEvent>,
    events_rx: mpsc::UnboundedReceiver<TaskEvent>,
    observed: VecDeque<SessionEvent>,
    outstanding: usize,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("selected_game", &self.selected_game)
            .field("history", &self.history.len())
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("outstanding", &self.outstanding)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, sink: impl NoticeSink, settings: SessionSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            resolver: GameResolver::new(Arc::clone(&backend)),
            known_games: KnownGames::new(),
            announcer: ErrorAnnouncer::new(sink, settings.announce_gap),
            artifacts: ArtifactCache::new(Arc::clone(&backend)),
            backend,
            settings,
            selected_game: None,
            history: Vec::new(),
            state: SessionState::Idle,
            last_outcome: None,
            generation: 0,
            selection: 0,
            remote_prefix: Some(0),
            active: None,
            barrier: None,
            events_tx,
            events_rx,
            observed: VecDeque::new(),
            outstanding: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    #[must_use]
    pub fn selected_game(&self) -> Option<&GameId> {
        self.selected_game.as_ref()
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<&TurnOutcome> {
        self.last_outcome.as_ref()
    }

    #[must_use]
    pub fn active_stream(&self) -> Option<&StreamHandle> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The known games, once loaded.
    #[must_use]
    pub fn known_games(&self) -> Option<&[GameId]> {
        self.known_games.get()
    }

    #[must_use]
    pub fn announcer(&self) -> &ErrorAnnouncer {
        &self.announcer
    }

    #[must_use]
    pub fn artifacts(&self) -> &ArtifactCache {
        &self.artifacts
    }

    /// True while any background task has not reported back.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.outstanding > 0
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Fetch the known-games list. Memoized for the session's lifetime.
    pub async fn load_known_games(&self) -> Result<Vec<GameId>, ChatError> {
        match self.known_games.load(self.backend.as_ref()).await {
            Ok(games) => Ok(games.to_vec()),
            Err(error) => {
                tracing::warn!(kind = ?error.kind(), "Failed to load known games");
                self.announcer.push(&error);
                Err(error)
            }
        }
    }

    /// Select a game and replace the local history with the backend's copy.
    pub fn select_game(&mut self, name: &str) -> Result<(), SessionError> {
        if self.known_games.get().is_none() {
            return Err(SessionError::GamesNotLoaded);
        }
        let game = self
            .known_games
            .find(name.trim())
            .ok_or_else(|| SessionError::UnknownGame(name.to_string()))?;

        self.supersede_turn();
        self.history.clear();
        self.selection += 1;
        self.remote_prefix = None;
        self.selected_game = Some(game.clone());
        tracing::debug!(game = %game, selection = self.selection, "Selected game");

        let selection = self.selection;
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        let (after, done) = self.chain_barrier();
        self.spawn_tracked(async move {
            wait_for(after).await;
            let result = backend.message_history(&game).await;
            // Queue the history ahead of anything a waiting turn reports.
            let _ = events.send(TaskEvent::HistoryFetched {
                selection,
                game,
                result,
            });
            let _ = done.send(true);
        });
        Ok(())
    }

    /// Ask a question. Returns `false` (and does nothing) for blank input.
    pub fn send(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.supersede_turn();
        self.begin_turn(text.to_string());
        true
    }

    /// Replace the user message at `index` and everything after it, then ask again.
    ///
    /// Returns `Ok(false)` for blank `text`.
    pub fn edit_and_resend(&mut self, index: usize, text: &str) -> Result<bool, SessionError> {
        let len = self.history.len();
        let message = self
            .history
            .get(index)
            .ok_or(SessionError::InvalidIndex { index, len })?;
        if message.role() != Role::User {
            return Err(SessionError::NotAUserMessage(index));
        }
        if text.trim().is_empty() {
            return Ok(false);
        }

        // The in-flight placeholder always sits after `index`.
        self.supersede_turn();

        let remote_index = persisted_index(&self.history, index);
        let drops_persisted = self.history[index..].iter().any(Message::is_persisted);
        self.history.truncate(index);
        tracing::debug!(index, remote_index, drops_persisted, "Editing message");

        if drops_persisted && let Some(game) = self.selected_game.clone() {
            match self.remote_prefix {
                Some(prefix) => {
                    self.spawn_remote(game, RemoteOperation::DeleteFrom(prefix + remote_index));
                }
                None => {
                    tracing::warn!(game = %game, index, "Remote history offset unknown; skipping delete");
                    self.announcer.push(UNSYNCED_EDIT);
                }
            }
        }

        self.begin_turn(text.to_string());
        Ok(true)
    }

    /// Empty the conversation locally and, with a game selected, remotely.
    pub fn clear_chat(&mut self) {
        self.supersede_turn();
        self.history.clear();
        // A history fetch still in flight must not repopulate the chat.
        self.selection += 1;
        tracing::debug!("Cleared chat");

        if let Some(game) = self.selected_game.clone() {
            // Later deletes are chained behind the clear.
            self.remote_prefix = Some(0);
            self.spawn_remote(game, RemoteOperation::Clear);
        }
    }

    /// Remove the Error message at `index`.
    pub fn dismiss_error(&mut self, index: usize) -> Result<Message, SessionError> {
        let len = self.history.len();
        let message = self
            .history
            .get(index)
            .ok_or(SessionError::InvalidIndex { index, len })?;
        if message.role() != Role::Error {
            return Err(SessionError::NotAnErrorMessage(index));
        }

        let removed = self.history.remove(index);
        if let Some(active) = &mut self.active
            && active.placeholder > index
        {
            active.placeholder -= 1;
        }
        Ok(removed)
    }

    /// Fetch the document behind a citation. Failures are also announced.
    pub async fn open_citation(&self, citation: &CitationRef) -> Result<ArtifactHandle, ChatError> {
        self.artifacts.resolve(citation).await.inspect_err(|error| {
            tracing::warn!(path = citation.document_path(), kind = ?error.kind(), "Failed to open citation");
            self.announcer.push(error);
        })
    }

    pub fn close_artifact(&self, handle: &ArtifactHandle) -> bool {
        self.artifacts.release(handle)
    }

    // ========================================================================
    // Event pump
    // ========================================================================

    /// Apply every report already queued, without waiting.
    pub fn process_events(&mut self) -> Vec<SessionEvent> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
        self.observed.drain(..).collect()
    }

    /// Wait for the next observable event.
    ///
    /// Returns `None` once no background task is outstanding and nothing is
    /// queued. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.observed.pop_front() {
                return Some(event);
            }
            let event = if self.outstanding == 0 {
                self.events_rx.try_recv().ok()?
            } else {
                self.events_rx.recv().await?
            };
            self.apply(event);
        }
    }

    /// Pump until every background task has finished.
    pub async fn settle(&mut self) {
        while self.next_event().await.is_some() {}
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn begin_turn(&mut self, question: String) {
        self.history.push(Message::user(question.clone()));
        self.history.push(Message::placeholder());

        self.generation += 1;
        let generation = self.generation;
        let (abort, registration) = AbortHandle::new_pair();
        self.active = Some(StreamHandle {
            generation,
            placeholder: self.history.len() - 1,
            abort,
        });
        self.state = if self.selected_game.is_some() {
            SessionState::Streaming
        } else {
            SessionState::Resolving
        };
        tracing::debug!(generation, game = ?self.selected_game, "Starting turn");

        let turn = Turn {
            generation,
            question,
            game: self.selected_game.clone(),
            backend: Arc::clone(&self.backend),
            resolver: self.resolver.clone(),
            known_games: self.known_games.clone(),
            settings: self.settings.clone(),
            after: self.barrier.clone(),
            events: self.events_tx.clone(),
        };
        self.spawn_tracked(async move {
            let _ = Abortable::new(turn.run(), registration).await;
        });
    }

    /// Drop the in-flight turn: later reports from it are ignored.
    fn supersede_turn(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };
        handle.abort.abort();
        self.generation += 1;
        if self
            .history
            .get(handle.placeholder)
            .is_some_and(Message::is_placeholder)
        {
            self.history.remove(handle.placeholder);
        }
        self.state = SessionState::Idle;
        self.last_outcome = Some(TurnOutcome::Superseded);
        tracing::debug!(generation = handle.generation, "Superseded turn");
    }

    fn chain_barrier(&mut self) -> (Barrier, watch::Sender<bool>) {
        let (done, finished) = watch::channel(false);
        let after = self.barrier.replace(finished);
        (after, done)
    }

    fn spawn_remote(&mut self, game: GameId, operation: RemoteOperation) {
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        let (after, done) = self.chain_barrier();
        self.spawn_tracked(async move {
            wait_for(after).await;
            let result = match operation {
                RemoteOperation::DeleteFrom(index) => backend.delete_from(&game, index).await,
                RemoteOperation::Clear => backend.clear_history(&game).await,
            };
            let _ = done.send(true);
            if let Err(error) = result {
                let _ = events.send(TaskEvent::RemoteFailed { operation, error });
            }
        });
    }

    fn spawn_tracked(&mut self, task: impl Future<Output = ()> + Send + 'static) {
        self.outstanding += 1;
        let guard = TaskGuard(self.events_tx.clone());
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    fn apply(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::TaskFinished => {
                self.outstanding = self.outstanding.saturating_sub(1);
            }
            TaskEvent::Resolved {
                generation,
                game,
                remote_prefix,
            } => {
                if !self.is_current(generation) {
                    tracing::trace!(generation, "Dropping stale resolution");
                    return;
                }
                self.selected_game = Some(game.clone());
                self.remote_prefix = remote_prefix;
                self.state = SessionState::Streaming;
                self.observed.push_back(SessionEvent::GameResolved(game));
            }
            TaskEvent::Unresolved { generation } => {
                if !self.is_current(generation) {
                    tracing::trace!(generation, "Dropping stale resolution");
                    return;
                }
                self.state = SessionState::Streaming;
                self.observed.push_back(SessionEvent::Unresolved);
            }
            TaskEvent::Chunk { generation, text } => {
                let index = match &self.active {
                    Some(active) if active.generation == generation => active.placeholder,
                    _ => {
                        tracing::trace!(generation, "Dropping stale chunk");
                        return;
                    }
                };
                if let Some(message) = self.history.get_mut(index) {
                    message.append(&text);
                    self.observed.push_back(SessionEvent::Chunk(text));
                }
            }
            TaskEvent::TurnEnded { generation, end } => {
                if !self.is_current(generation) {
                    tracing::trace!(generation, "Dropping stale turn end");
                    return;
                }
                self.finish_turn(end);
            }
            TaskEvent::HistoryFetched {
                selection,
                game,
                result,
            } => self.apply_history(selection, game, result),
            TaskEvent::RemoteFailed { operation, error } => {
                tracing::warn!(%operation, kind = ?error.kind(), "Remote history update failed");
                if operation == RemoteOperation::Clear {
                    self.remote_prefix = None;
                }
                self.announcer.push(&error);
                self.observed
                    .push_back(SessionEvent::RemoteFailed { operation, error });
            }
        }
    }

    fn finish_turn(&mut self, end: TurnEnd) {
        let Some(handle) = self.active.take() else {
            return;
        };
        let index = handle.placeholder;
        self.state = SessionState::Idle;

        let end = match end {
            TurnEnd::Completed
                if self
                    .history
                    .get(index)
                    .is_none_or(|message| message.content().is_empty()) =>
            {
                TurnEnd::Failed(ChatError::backend(EMPTY_ANSWER))
            }
            other => other,
        };

        let outcome = match end {
            TurnEnd::Completed => {
                for position in index.saturating_sub(1)..=index {
                    if let Some(message) = self.history.get_mut(position) {
                        message.mark_persisted();
                    }
                }
                TurnOutcome::Completed
            }
            TurnEnd::Advisory => TurnOutcome::Advisory,
            TurnEnd::Failed(error) => {
                self.record_failure(index, &error);
                self.announcer.push(&error);
                TurnOutcome::Failed(error)
            }
        };
        tracing::debug!(generation = handle.generation, outcome = ?outcome, "Turn finished");

        self.last_outcome = Some(outcome.clone());
        self.observed.push_back(SessionEvent::TurnFinished(outcome));
    }

    fn record_failure(&mut self, index: usize, error: &ChatError) {
        let failure = Message::from_failure(error);
        match self.history.get_mut(index) {
            Some(message) if message.is_placeholder() => *message = failure,
            Some(_) => self.history.insert(index + 1, failure),
            None => self.history.push(failure),
        }
    }

    fn apply_history(
        &mut self,
        selection: u64,
        game: GameId,
        result: Result<Vec<Message>, ChatError>,
    ) {
        if selection != self.selection || self.selected_game.as_ref() != Some(&game) {
            tracing::trace!(selection, game = %game, "Dropping superseded history");
            return;
        }
        match result {
            Ok(fetched) => {
                let count = fetched.len();
                let mut history: Vec<Message> =
                    fetched.into_iter().map(Message::into_persisted).collect();
                // Turns started since the selection stay after the fetched history.
                history.append(&mut self.history);
                self.history = history;
                self.remote_prefix = Some(0);
                if let Some(active) = &mut self.active {
                    active.placeholder += count;
                }
                tracing::debug!(game = %game, messages = count, "Loaded history");
                self.observed.push_back(SessionEvent::HistoryLoaded {
                    game,
                    messages: count,
                });
            }
            Err(error) => {
                tracing::warn!(game = %game, kind = ?error.kind(), "Failed to load history");
                self.remote_prefix = None;
                self.announcer.push(&error);
                self.observed
                    .push_back(SessionEvent::HistoryFailed { game, error });
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.abort.abort();
        }
        self.artifacts.release_all();
    }
}

/// Everything one turn's task needs, detached from the session.
struct Turn {
    generation: u64,
    question: String,
    game: Option<GameId>,
    backend: Arc<dyn Backend>,
    resolver: GameResolver,
    known_games: KnownGames,
    settings: SessionSettings,
    after: Barrier,
    events: mpsc::UnboundedSender<TaskEvent>,
}

impl Turn {
    async fn run(self) {
        let end = self.drive().await;
        self.emit(TaskEvent::TurnEnded {
            generation: self.generation,
            end,
        });
    }

    async fn drive(&self) -> TurnEnd {
        wait_for(self.after.clone()).await;

        let game = match &self.game {
            Some(game) => game.clone(),
            None => match self.resolve().await {
                Ok(Resolution::Resolved(game)) => {
                    let remote_prefix = self.remote_prefix(&game).await;
                    self.emit(TaskEvent::Resolved {
                        generation: self.generation,
                        game: game.clone(),
                        remote_prefix,
                    });
                    game
                }
                Ok(Resolution::Unresolved) => {
                    self.emit(TaskEvent::Unresolved {
                        generation: self.generation,
                    });
                    return self.advisory().await;
                }
                Err(error) => return TurnEnd::Failed(error),
            },
        };

        let body = match self.backend.ask(&game, &self.question).await {
            Ok(body) => body,
            Err(error) => return TurnEnd::Failed(error),
        };

        let mut frames = decode_frames(body);
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(FrameEvent::Chunk(text)) => {
                    self.emit(TaskEvent::Chunk {
                        generation: self.generation,
                        text,
                    });
                }
                Ok(FrameEvent::Done) => return TurnEnd::Completed,
                Ok(FrameEvent::Error(message)) => {
                    tracing::warn!(generation = self.generation, "Answer stream reported an error");
                    return TurnEnd::Failed(ChatError::backend(message));
                }
                Err(error) => return TurnEnd::Failed(error),
            }
        }

        tracing::warn!(generation = self.generation, "Answer stream ended without a terminal frame");
        TurnEnd::Failed(ChatError::NetworkError)
    }

    async fn resolve(&self) -> Result<Resolution, ChatError> {
        let known = self.known_games.load(self.backend.as_ref()).await?;
        self.resolver.determine(&self.question, known).await
    }

    /// Length of the backend's history for a game picked by the resolver.
    ///
    /// Local history is kept as-is, so edits need this offset to address the
    /// backend's copy.
    async fn remote_prefix(&self, game: &GameId) -> Option<usize> {
        match self.backend.message_history(game).await {
            Ok(messages) => Some(messages.len()),
            Err(error) => {
                tracing::warn!(game = %game, kind = ?error.kind(), "Failed to count remote history");
                None
            }
        }
    }

    async fn advisory(&self) -> TurnEnd {
        stream_advisory(
            self.settings.advisory_chunk_chars,
            self.settings.advisory_delay,
            |chunk| {
                self.emit(TaskEvent::Chunk {
                    generation: self.generation,
                    text: chunk.to_string(),
                })
            },
        )
        .await;
        TurnEnd::Advisory
    }

    fn emit(&self, event: TaskEvent) -> bool {
        self.events.send(event).is_ok()
    }
}
