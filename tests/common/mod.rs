//! Shared test utilities and fixtures
//!
//! A wiremock server standing in for the rules backend, plus a session wired
//! to it through the real HTTP client.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bgchat_engine::{BackendConfig, ChatSession, HttpBackend, Notice, SessionSettings};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub type Notices = mpsc::UnboundedReceiver<Notice>;

pub fn api(endpoint: &str) -> String {
    format!("/api/{endpoint}")
}

pub fn quick_settings() -> SessionSettings {
    SessionSettings {
        announce_gap: Duration::ZERO,
        advisory_chunk_chars: 8,
        advisory_delay: Duration::ZERO,
    }
}

pub fn http_backend(server: &MockServer) -> HttpBackend {
    let config = BackendConfig::new(&api_base(server)).expect("mock server url");
    HttpBackend::new(config).expect("http client")
}

pub fn api_base(server: &MockServer) -> String {
    format!("{}/api/", server.uri())
}

pub fn session_for(server: &MockServer) -> (ChatSession, Notices) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = ChatSession::new(Arc::new(http_backend(server)), tx, quick_settings());
    (session, rx)
}

/// Start a backend mock that knows Catan and Wingspan.
pub async fn start_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("known-board-games")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["Catan", "Wingspan"])))
        .mount(&server)
        .await;
    server
}

/// A streamed answer body: one `chunk` frame per piece, then `done`.
pub fn answer_body(pieces: &[&str]) -> String {
    let mut body: String = pieces
        .iter()
        .map(|piece| format!("data: {}\n\n", json!({ "chunk": piece })))
        .collect();
    body.push_str("data: {\"done\": true}\n\n");
    body
}

pub async fn mount_history(server: &MockServer, game: &str, messages: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(api("message-history")))
        .and(body_partial_json(json!({ "board_game": game })))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages))
        .mount(server)
        .await;
}

pub async fn mount_answer(server: &MockServer, question: &str, body: String) {
    Mock::given(method("POST"))
        .and(path(api("ask-question")))
        .and(body_partial_json(json!({ "question": question })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

pub async fn mount_determination(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(path(api("determine-board-game")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(answer)))
        .mount(server)
        .await;
}

/// Paths of the requests the server saw, in arrival order.
pub async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

pub async fn next_notice(notices: &mut Notices) -> String {
    tokio::time::timeout(Duration::from_secs(5), notices.recv())
        .await
        .expect("notice in time")
        .expect("announcer alive")
        .text()
        .to_string()
}
