use std::fmt;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::{Backend, BackendFut, ByteStream, ChatError, Document, GameId, Message};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;

// reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

const DOCUMENTS_PREFIX: &str = "pdfs/";

#[derive(Debug, thiserror::Error)]
pub enum BackendConfigError {
    #[error("invalid backend base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("backend base URL {0:?} must use http or https")]
    UnsupportedScheme(String),
    #[error("backend token contains characters not allowed in a header")]
    InvalidToken,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Connection settings for [`HttpBackend`].
#[derive(Clone)]
pub struct BackendConfig {
    base_url: Url,
    token: Option<String>,
    connect_timeout: Duration,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("stream_idle_timeout", &self.stream_idle_timeout)
            .finish()
    }
}

impl BackendConfig {
    /// Parse and normalize `base_url`. Endpoint paths are joined onto it, so a
    /// trailing `/` is added when missing.
    pub fn new(base_url: &str) -> Result<Self, BackendConfigError> {
        let trimmed = base_url.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        let url = Url::parse(&normalized).map_err(|source| BackendConfigError::InvalidBaseUrl {
            url: trimmed.to_string(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BackendConfigError::UnsupportedScheme(trimmed.to_string()));
        }

        Ok(Self {
            base_url: url,
            token: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            stream_idle_timeout: Duration::from_secs(DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound for non-streaming requests, body included.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Longest silence tolerated between two reads of an answer stream.
    #[must_use]
    pub const fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub const fn stream_idle_timeout(&self) -> Duration {
        self.stream_idle_timeout
    }
}

fn client_builder(config: &BackendConfig) -> Result<reqwest::ClientBuilder, BackendConfigError> {
    let mut default_headers = HeaderMap::new();
    if let Some(token) = &config.token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| BackendConfigError::InvalidToken)?;
        value.set_sensitive(true);
        default_headers.insert(reqwest::header::AUTHORIZATION, value);
    }

    Ok(reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers))
}

/// Read at most [`MAX_ERROR_BODY_BYTES`] of a failed response.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Classify a non-success status with its (already read) body.
#[must_use]
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);
    ChatError::from_status(status.as_u16(), message.as_deref())
}

fn transport_error(operation: &'static str, error: &reqwest::Error) -> ChatError {
    if error.is_decode() {
        tracing::warn!(%error, operation, "Backend returned an undecodable body");
        return ChatError::ServerError;
    }
    tracing::warn!(%error, operation, timeout = error.is_timeout(), "Backend request failed");
    ChatError::NetworkError
}

async fn expect_success(
    operation: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_capped_error_body(response).await;
    let error = classify_status(status, &body);
    tracing::warn!(
        operation,
        status = status.as_u16(),
        kind = ?error.kind(),
        "Backend rejected request"
    );
    Err(error)
}

/// reqwest implementation of [`Backend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendConfigError> {
        let client = client_builder(&config)?.build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChatError> {
        self.config.base_url.join(path).map_err(|e| {
            tracing::warn!(%e, path, "Failed to build endpoint URL");
            ChatError::NetworkError
        })
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ChatError> {
        tracing::debug!(operation, "Backend request");
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;
        expect_success(operation, response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ChatError> {
        let request = self
            .client
            .post(self.endpoint(path)?)
            .timeout(self.config.request_timeout)
            .json(&body);
        let response = self.send(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| transport_error(operation, &e))
    }

    async fn post_ack(
        &self,
        operation: &'static str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), ChatError> {
        let request = self
            .client
            .post(self.endpoint(path)?)
            .timeout(self.config.request_timeout)
            .json(&body);
        self.send(operation, request).await.map(|_| ())
    }

    fn document_url(&self, path: &str) -> Result<Url, ChatError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() || has_dot_segment(path) {
            tracing::warn!(path, "Rejected document path");
            return Err(ChatError::NotFound);
        }
        self.endpoint(&format!("{DOCUMENTS_PREFIX}{path}"))
    }

    async fn open_answer_stream(
        &self,
        game: &GameId,
        question: &str,
    ) -> Result<ByteStream, ChatError> {
        // No total timeout here: a long answer is fine as long as it keeps moving.
        let request = self
            .client
            .post(self.endpoint("ask-question")?)
            .json(&json!({ "question": question, "board_game": game.as_str() }));
        let response = self.send("ask-question", request).await?;

        let idle = self.config.stream_idle_timeout;
        let body = response.bytes_stream();
        Ok(Box::pin(stream::unfold(Some(body), move |state| async move {
            let mut body = state?;
            match tokio::time::timeout(idle, body.next()).await {
                Err(_) => {
                    tracing::warn!(idle_secs = idle.as_secs(), "Answer stream idle timeout");
                    Some((Err(ChatError::NetworkError), None))
                }
                Ok(None) => None,
                Ok(Some(Ok(bytes))) => Some((Ok(bytes), Some(body))),
                Ok(Some(Err(e))) => Some((Err(transport_error("ask-question", &e)), None)),
            }
        })))
    }

    async fn get_document(&self, path: &str) -> Result<Document, ChatError> {
        let request = self
            .client
            .get(self.document_url(path)?)
            .timeout(self.config.request_timeout);
        let response = self.send("fetch-document", request).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("fetch-document", &e))?;
        Ok(Document {
            content_type,
            bytes,
        })
    }
}

/// True if `path` holds a `.` or `..` segment, percent-encoded or not.
///
/// `Url::join` would resolve those out of the documents prefix, and it treats
/// `\` as a separator too.
fn has_dot_segment(path: &str) -> bool {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    decoded
        .split(['/', '\\'])
        .any(|segment| segment == "." || segment == "..")
}

impl Backend for HttpBackend {
    fn known_games(&self) -> BackendFut<'_, Vec<GameId>> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.endpoint("known-board-games")?)
                .timeout(self.config.request_timeout);
            let response = self.send("known-board-games", request).await?;
            response
                .json::<Vec<GameId>>()
                .await
                .map_err(|e| transport_error("known-board-games", &e))
        })
    }

    fn message_history<'a>(&'a self, game: &'a GameId) -> BackendFut<'a, Vec<Message>> {
        Box::pin(self.post_json(
            "message-history",
            "message-history",
            json!({ "board_game": game.as_str() }),
        ))
    }

    fn delete_from<'a>(&'a self, game: &'a GameId, index: usize) -> BackendFut<'a, ()> {
        Box::pin(self.post_ack(
            "delete-messages-from-index",
            "delete-messages-from-index",
            json!({ "board_game": game.as_str(), "index": index }),
        ))
    }

    fn clear_history<'a>(&'a self, game: &'a GameId) -> BackendFut<'a, ()> {
        Box::pin(self.post_ack(
            "clear-message-history",
            "clear-message-history",
            json!({ "board_game": game.as_str() }),
        ))
    }

    fn determine_game<'a>(&'a self, question: &'a str) -> BackendFut<'a, String> {
        Box::pin(self.post_json(
            "determine-board-game",
            "determine-board-game",
            json!({ "question": question }),
        ))
    }

    fn ask<'a>(&'a self, game: &'a GameId, question: &'a str) -> BackendFut<'a, ByteStream> {
        Box::pin(self.open_answer_stream(game, question))
    }

    fn fetch_document<'a>(&'a self, path: &'a str) -> BackendFut<'a, Document> {
        Box::pin(self.get_document(path))
    }
}
