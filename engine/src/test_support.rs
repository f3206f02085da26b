//! Scripted in-memory backend for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use tokio::sync::mpsc;

use bgchat_client::{Backend, BackendFut, ByteStream, Document};
use bgchat_types::{ChatError, GameId, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    KnownGames,
    History(String),
    Delete { game: String, index: usize },
    Clear(String),
    Determine(String),
    Ask { game: String, question: String },
    Document(String),
}

pub(crate) enum Answer {
    Body(Vec<Bytes>),
    Reject(ChatError),
    Channel(mpsc::UnboundedReceiver<Result<Bytes, ChatError>>),
}

impl Answer {
    /// A well-formed body: one `chunk` frame per piece, then `done`.
    pub(crate) fn chunks(pieces: &[&str]) -> Self {
        let mut lines: Vec<String> = pieces.iter().map(|piece| chunk_frame(piece)).collect();
        lines.push("data: {\"done\": true}\n\n".to_string());
        Self::raw(&lines.iter().map(String::as_str).collect::<Vec<_>>())
    }

    /// Raw body reads, delivered one per poll.
    pub(crate) fn raw(reads: &[&str]) -> Self {
        Self::Body(
            reads
                .iter()
                .map(|read| Bytes::copy_from_slice(read.as_bytes()))
                .collect(),
        )
    }
}

pub(crate) fn chunk_frame(text: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "chunk": text }))
}

pub(crate) fn error_frame(text: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "error": text }))
}

#[derive(Default)]
struct Script {
    games: Option<Result<Vec<GameId>, ChatError>>,
    histories: HashMap<String, Result<Vec<Message>, ChatError>>,
    history_delays: HashMap<String, Duration>,
    determinations: VecDeque<Result<String, ChatError>>,
    answers: HashMap<String, VecDeque<Answer>>,
    documents: HashMap<String, Result<Document, ChatError>>,
    document_delay: Option<Duration>,
    delete_result: Option<ChatError>,
    clear_result: Option<ChatError>,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn pdf_document() -> Document {
        Document {
            content_type: Some("application/pdf".to_string()),
            bytes: Bytes::from_static(b"%PDF-1.7\n%test\n"),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub(crate) fn asked(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Ask { game, question } => Some((game, question)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn with_games(self: Arc<Self>, names: &[&str]) -> Arc<Self> {
        self.set_games(names);
        self
    }

    pub(crate) fn with_games_result(
        self: Arc<Self>,
        result: Result<Vec<GameId>, ChatError>,
    ) -> Arc<Self> {
        self.script().games = Some(result);
        self
    }

    pub(crate) fn set_games(&self, names: &[&str]) {
        let games = names.iter().map(|name| GameId::new(*name).unwrap()).collect();
        self.script().games = Some(Ok(games));
    }

    pub(crate) fn with_history(self: Arc<Self>, game: &str, messages: Vec<Message>) -> Arc<Self> {
        self.script().histories.insert(game.to_string(), Ok(messages));
        self
    }

    pub(crate) fn with_history_result(
        self: Arc<Self>,
        game: &str,
        result: Result<Vec<Message>, ChatError>,
    ) -> Arc<Self> {
        self.script().histories.insert(game.to_string(), result);
        self
    }

    pub(crate) fn with_history_delay(self: Arc<Self>, game: &str, delay: Duration) -> Arc<Self> {
        self.script().history_delays.insert(game.to_string(), delay);
        self
    }

    pub(crate) fn with_determination(self: Arc<Self>, result: Result<&str, ChatError>) -> Arc<Self> {
        self.script()
            .determinations
            .push_back(result.map(str::to_string));
        self
    }

    pub(crate) fn with_answer(self: Arc<Self>, question: &str, answer: Answer) -> Arc<Self> {
        self.push_answer(question, answer);
        self
    }

    pub(crate) fn push_answer(&self, question: &str, answer: Answer) {
        self.script()
            .answers
            .entry(question.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Script an answer whose body is fed by the returned sender.
    pub(crate) fn channel_answer(
        &self,
        question: &str,
    ) -> mpsc::UnboundedSender<Result<Bytes, ChatError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push_answer(question, Answer::Channel(rx));
        tx
    }

    pub(crate) fn with_pdf(self: Arc<Self>, path: &str) -> Arc<Self> {
        self.set_document(path, Ok(Self::pdf_document()));
        self
    }

    pub(crate) fn with_document(
        self: Arc<Self>,
        path: &str,
        result: Result<Document, ChatError>,
    ) -> Arc<Self> {
        self.set_document(path, result);
        self
    }

    pub(crate) fn set_document(&self, path: &str, result: Result<Document, ChatError>) {
        self.script().documents.insert(path.to_string(), result);
    }

    pub(crate) fn with_document_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        self.script().document_delay = Some(delay);
        self
    }

    pub(crate) fn with_delete_failure(self: Arc<Self>, error: ChatError) -> Arc<Self> {
        self.script().delete_result = Some(error);
        self
    }

    pub(crate) fn with_clear_failure(self: Arc<Self>, error: ChatError) -> Arc<Self> {
        self.script().clear_result = Some(error);
        self
    }
}

fn body_stream(answer: Answer) -> ByteStream {
    match answer {
        Answer::Body(reads) => Box::pin(stream::iter(reads.into_iter().map(Ok))),
        Answer::Channel(rx) => Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })),
        Answer::Reject(_) => Box::pin(stream::empty()),
    }
}

impl Backend for ScriptedBackend {
    fn known_games(&self) -> BackendFut<'_, Vec<GameId>> {
        Box::pin(async move {
            self.record(Call::KnownGames);
            tokio::task::yield_now().await;
            self.script()
                .games
                .clone()
                .unwrap_or(Err(ChatError::ServerError))
        })
    }

    fn message_history<'a>(&'a self, game: &'a GameId) -> BackendFut<'a, Vec<Message>> {
        Box::pin(async move {
            self.record(Call::History(game.to_string()));
            let delay = self.script().history_delays.get(game.as_str()).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.script()
                .histories
                .get(game.as_str())
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
                .map(|messages| messages.into_iter().map(Message::into_persisted).collect())
        })
    }

    fn delete_from<'a>(&'a self, game: &'a GameId, index: usize) -> BackendFut<'a, ()> {
        Box::pin(async move {
            self.record(Call::Delete {
                game: game.to_string(),
                index,
            });
            self.script().delete_result.clone().map_or(Ok(()), Err)
        })
    }

    fn clear_history<'a>(&'a self, game: &'a GameId) -> BackendFut<'a, ()> {
        Box::pin(async move {
            self.record(Call::Clear(game.to_string()));
            self.script().clear_result.clone().map_or(Ok(()), Err)
        })
    }

    fn determine_game<'a>(&'a self, question: &'a str) -> BackendFut<'a, String> {
        Box::pin(async move {
            self.record(Call::Determine(question.to_string()));
            self.script()
                .determinations
                .pop_front()
                .unwrap_or_else(|| Ok("UNKNOWN".to_string()))
        })
    }

    fn ask<'a>(&'a self, game: &'a GameId, question: &'a str) -> BackendFut<'a, ByteStream> {
        Box::pin(async move {
            self.record(Call::Ask {
                game: game.to_string(),
                question: question.to_string(),
            });
            let answer = self
                .script()
                .answers
                .get_mut(question)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Answer::Reject(ChatError::ServerError));
            match answer {
                Answer::Reject(error) => Err(error),
                answer => Ok(body_stream(answer)),
            }
        })
    }

    fn fetch_document<'a>(&'a self, path: &'a str) -> BackendFut<'a, Document> {
        Box::pin(async move {
            self.record(Call::Document(path.to_string()));
            let delay = self.script().document_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.script()
                .documents
                .get(path)
                .cloned()
                .unwrap_or(Err(ChatError::NotFound))
        })
    }
}
