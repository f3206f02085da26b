use serde::Deserialize;
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use bgchat_client::{BackendConfig, BackendConfigError};

use crate::session::SessionSettings;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/";

pub const BASE_URL_ENV: &str = "BGCHAT_BASE_URL";
pub const TOKEN_ENV: &str = "BGCHAT_TOKEN";

#[derive(Debug, Default, Deserialize)]
pub struct BgchatConfig {
    pub backend: Option<BackendSection>,
    pub session: Option<SessionSection>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    InvalidBaseUrl(#[from] BackendConfigError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::InvalidBaseUrl(_) => None,
        }
    }
}

#[derive(Default, Deserialize)]
pub struct BackendSection {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
}

impl fmt::Debug for BackendSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSection")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<set>"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("stream_idle_timeout_secs", &self.stream_idle_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionSection {
    /// Minimum gap between two announced notices.
    pub announce_gap_ms: Option<u64>,
    pub advisory_chunk_chars: Option<usize>,
    pub advisory_delay_ms: Option<u64>,
}

/// Expand `${VAR}` references. Unset variables expand to the empty string.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + end_rel];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + end_rel + 1..];
    }

    out.push_str(rest);
    out
}

impl BgchatConfig {
    /// Load `~/.bgchat/config.toml`. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Backend settings with `BGCHAT_BASE_URL` / `BGCHAT_TOKEN` overrides applied.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        self.backend_config_with(|name| env::var(name).ok())
    }

    pub(crate) fn backend_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<BackendConfig, ConfigError> {
        let section = self.backend.as_ref();
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let base_url = non_empty(lookup(BASE_URL_ENV))
            .or_else(|| non_empty(section.and_then(|s| s.base_url.as_deref()).map(expand_env_vars)))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let token = non_empty(lookup(TOKEN_ENV))
            .or_else(|| non_empty(section.and_then(|s| s.token.as_deref()).map(expand_env_vars)));

        let mut config = BackendConfig::new(&base_url)?.with_token(token);
        if let Some(secs) = section.and_then(|s| s.connect_timeout_secs).filter(|s| *s > 0) {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = section.and_then(|s| s.request_timeout_secs).filter(|s| *s > 0) {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = section
            .and_then(|s| s.stream_idle_timeout_secs)
            .filter(|s| *s > 0)
        {
            config = config.with_stream_idle_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        let mut settings = SessionSettings::default();
        let Some(section) = &self.session else {
            return settings;
        };
        if let Some(ms) = section.announce_gap_ms {
            settings.announce_gap = Duration::from_millis(ms);
        }
        if let Some(chars) = section.advisory_chunk_chars.filter(|c| *c > 0) {
            settings.advisory_chunk_chars = chars;
        }
        if let Some(ms) = section.advisory_delay_ms {
            settings.advisory_delay = Duration::from_millis(ms);
        }
        settings
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".bgchat").join("config.toml"))
}
