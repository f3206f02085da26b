//! bgchat CLI - line-oriented front end for the rules chat session.
//!
//! # Event Loop
//!
//! ```text
//! stdin line ──> commands::parse ──> ChatSession operation
//!                                          |
//!                        background tasks report back
//!                                          v
//! stdout  <── render(SessionEvent) <── session.next_event()
//! ```
//!
//! Notices from the session's announcer are printed to stderr by a separate
//! task, prefixed with `!`.

mod commands;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::{Write, stdout},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bgchat_engine::{
    ArtifactHandle, BgchatConfig, ChatSession, CitationRef, HttpBackend, Message, Notice, Role,
    SessionEvent, SessionState, TurnOutcome, document_citations,
};
use commands::{Command, HELP};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with the chat.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.bgchat/logs/bgchat.log
    if let Some(config_path) = BgchatConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("bgchat.log"));
    }

    // Fallback: ./.bgchat/logs/bgchat.log
    candidates.push(PathBuf::from(".bgchat").join("logs").join("bgchat.log"));

    candidates
}

async fn print_notices(mut notices: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = notices.recv().await {
        eprintln!("! {notice}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match BgchatConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Ignoring config: {e}");
            BgchatConfig::default()
        }
    };
    let backend_config = config
        .backend_config()
        .context("invalid backend configuration")?;
    tracing::info!(base_url = %backend_config.base_url(), "Using backend");
    let backend = HttpBackend::new(backend_config).context("failed to build HTTP client")?;

    let (notices_tx, notices_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_notices(notices_rx));
    let session = ChatSession::new(Arc::new(backend), notices_tx, config.session_settings());

    let mut repl = Repl::new(session);
    repl.greet().await;
    let result = repl.run().await;

    drop(repl);
    printer.abort();
    result
}

enum Input {
    Line(Option<String>),
    Event(SessionEvent),
    Interrupt,
}

struct Repl {
    session: ChatSession,
    open: Option<ArtifactHandle>,
}

impl Repl {
    fn new(session: ChatSession) -> Self {
        Self {
            session,
            open: None,
        }
    }

    async fn greet(&self) {
        println!("bgchat - ask a rules question, or /help");
        if let Ok(games) = self.session.load_known_games().await {
            let names: Vec<&str> = games.iter().map(|game| game.as_str()).collect();
            println!("Known games: {}", names.join(", "));
        }
    }

    async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let busy = self.session.is_busy();
            let input = tokio::select! {
                line = lines.next_line() => Input::Line(line.context("failed to read stdin")?),
                Some(event) = self.session.next_event(), if busy => Input::Event(event),
                _ = tokio::signal::ctrl_c() => Input::Interrupt,
            };

            match input {
                Input::Line(None) | Input::Interrupt => break,
                Input::Line(Some(line)) => {
                    if !self.handle_line(&line).await {
                        break;
                    }
                }
                Input::Event(event) => self.render(event),
            }

            if !self.session.is_busy() {
                for event in self.session.process_events() {
                    self.render(event);
                }
            }
        }
        Ok(())
    }

    /// Returns `false` when the user asked to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let command = match commands::parse(line) {
            None => return true,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                println!("{e}");
                return true;
            }
        };

        match command {
            Command::Quit => return false,
            Command::Help => println!("{HELP}"),
            Command::Ask(text) => {
                if self.session.send(&text) {
                    self.announce_turn();
                }
            }
            Command::Games => self.list_games().await,
            Command::Game(name) => match self.session.select_game(&name) {
                Ok(()) => println!("Loading history for {name}..."),
                Err(e) => println!("{e}"),
            },
            Command::Edit { index, text } => match position(index) {
                Some(index) => match self.session.edit_and_resend(index, &text) {
                    Ok(true) => self.announce_turn(),
                    Ok(false) => {}
                    Err(e) => println!("{e}"),
                },
                None => println!("messages are numbered from 1"),
            },
            Command::Dismiss(index) => match position(index) {
                Some(index) => match self.session.dismiss_error(index) {
                    Ok(_) => println!("Dismissed."),
                    Err(e) => println!("{e}"),
                },
                None => println!("messages are numbered from 1"),
            },
            Command::Clear => {
                self.session.clear_chat();
                println!("Cleared.");
            }
            Command::History => print_history(self.session.history()),
            Command::Open(number) => self.open_citation(number).await,
            Command::Close => self.close_artifact(),
        }
        true
    }

    fn announce_turn(&self) {
        if self.session.state() == SessionState::Resolving {
            println!("(working out which game you mean...)");
        }
        print!("assistant> ");
        let _ = stdout().flush();
    }

    async fn list_games(&self) {
        let Ok(games) = self.session.load_known_games().await else {
            return;
        };
        let selected = self.session.selected_game();
        for game in &games {
            let marker = if Some(game) == selected { "*" } else { " " };
            println!("{marker} {game}");
        }
    }

    async fn open_citation(&mut self, number: usize) {
        let citations = last_answer_citations(self.session.history());
        let Some(citation) = position(number).and_then(|index| citations.get(index)) else {
            println!("no citation {number} in the last answer");
            return;
        };

        let Ok(handle) = self.session.open_citation(citation).await else {
            return;
        };
        if let Some(previous) = self.open.take()
            && !previous.same_artifact(&handle)
        {
            self.session.close_artifact(&previous);
        }
        println!(
            "Opened {} ({} bytes) #{}",
            handle.document_path(),
            handle.bytes().len(),
            handle.viewer_fragment()
        );
        self.open = Some(handle);
    }

    fn close_artifact(&mut self) {
        match self.open.take() {
            Some(handle) => {
                self.session.close_artifact(&handle);
                println!("Closed {}.", handle.document_path());
            }
            None => println!("no document is open"),
        }
    }

    fn render(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::GameResolved(game) => {
                print!("[{game}] ");
                let _ = stdout().flush();
            }
            SessionEvent::Chunk(text) => {
                print!("{text}");
                let _ = stdout().flush();
            }
            SessionEvent::TurnFinished(outcome) => {
                println!();
                if outcome == TurnOutcome::Completed {
                    print_sources(&last_answer_citations(self.session.history()));
                }
            }
            SessionEvent::HistoryLoaded { game, messages } => {
                println!("Loaded {messages} messages for {game}.");
                print_history(self.session.history());
            }
            // Failures reach the user through the announcer.
            SessionEvent::Unresolved
            | SessionEvent::HistoryFailed { .. }
            | SessionEvent::RemoteFailed { .. } => {}
        }
    }
}

/// One-based display number to history index.
fn position(number: usize) -> Option<usize> {
    number.checked_sub(1)
}

fn last_answer_citations(history: &[Message]) -> Vec<CitationRef> {
    history
        .iter()
        .rev()
        .find(|message| message.role() == Role::Assistant)
        .map(|message| document_citations(message.content()))
        .unwrap_or_default()
}

fn print_sources(citations: &[CitationRef]) {
    for (number, citation) in citations.iter().enumerate() {
        match citation.page() {
            Some(page) => println!("  [{}] {} p.{page}", number + 1, citation.document_path()),
            None => println!("  [{}] {}", number + 1, citation.document_path()),
        }
    }
}

fn print_history(history: &[Message]) {
    for (number, message) in history.iter().enumerate() {
        println!("[{}] {}> {}", number + 1, message.role(), message.content());
    }
}
