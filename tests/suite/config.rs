//! Configuration file to working backend.

use std::sync::Arc;

use bgchat_engine::{BgchatConfig, ChatSession, HttpBackend};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{api, api_base};

#[tokio::test]
async fn config_file_drives_the_http_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api("known-board-games")))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["Catan"])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    std::fs::write(
        &file,
        format!(
            "[backend]\nbase_url = \"{}\"\ntoken = \"secret-token\"\n\n[session]\nannounce_gap_ms = 0\nadvisory_delay_ms = 0\n",
            api_base(&server)
        ),
    )
    .unwrap();

    let config = BgchatConfig::load_from(&file).unwrap().unwrap();
    let settings = config.session_settings();
    assert!(settings.announce_gap.is_zero());

    let backend = HttpBackend::new(config.backend_config().unwrap()).unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    let session = ChatSession::new(Arc::new(backend), tx, settings);

    let games = session.load_known_games().await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].as_str(), "Catan");
}

#[test]
fn missing_config_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(
        BgchatConfig::load_from(&dir.path().join("absent.toml"))
            .unwrap()
            .is_none()
    );
}

#[test]
fn malformed_config_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.toml");
    std::fs::write(&file, "[backend\nbase_url = 3").unwrap();

    let error = BgchatConfig::load_from(&file).unwrap_err();
    assert_eq!(error.path(), Some(file.as_path()));
}
