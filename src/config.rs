//! Client configuration read from the environment.
//!
//! - `PP_API_BASE_URL`: backend base URL (default `http://127.0.0.1:8000`)
//! - `PP_HTTP_TIMEOUT_MS`: optional per-request timeout applied to every call
//! - `PP_SESSION_FILE`: where the CLI persists the session

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const SESSION_FILE_NAME: &str = ".ppadmin_session.json";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Option<Duration>,
    pub session_file: PathBuf,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Ok(Self { base_url: parse_base_url(base_url)?, timeout: None, session_file: default_session_file() })
    }

    pub fn from_env() -> ApiResult<Self> {
        let base = std::env::var("PP_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout = match std::env::var("PP_HTTP_TIMEOUT_MS") {
            Ok(v) => {
                let ms: u64 = v.trim().parse()
                    .map_err(|_| ApiError::config(format!("PP_HTTP_TIMEOUT_MS is not a number: '{}'", v)))?;
                if ms == 0 { None } else { Some(Duration::from_millis(ms)) }
            }
            Err(_) => None,
        };
        let session_file = std::env::var("PP_SESSION_FILE").map(PathBuf::from).unwrap_or_else(|_| default_session_file());
        Ok(Self { base_url: parse_base_url(&base)?, timeout, session_file })
    }

    pub fn with_base_url(mut self, base_url: &str) -> ApiResult<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Resolve an API path against the base URL. The path is appended to the
    /// base rather than joined, so a base with a path prefix keeps it.
    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let sep = if path.starts_with('/') { "" } else { "/" };
        Url::parse(&format!("{}{}{}", base, sep, path))
            .map_err(|e| ApiError::config(format!("invalid endpoint '{}': {}", path, e)))
    }
}

fn parse_base_url(base: &str) -> ApiResult<Url> {
    let url = Url::parse(base).map_err(|e| ApiError::config(format!("invalid base URL '{}': {}", base, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::config(format!("unsupported scheme '{}' in base URL", other))),
    }
}

fn default_session_file() -> PathBuf {
    let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")).ok();
    match home {
        Some(h) => PathBuf::from(h).join(SESSION_FILE_NAME),
        None => PathBuf::from(SESSION_FILE_NAME),
    }
}
