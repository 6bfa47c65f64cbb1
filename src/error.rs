//! Unified client error model.
//! Every gateway, session and resource call returns `ApiError`. Callers are
//! expected to special-case only `SessionExpired`, which means the store has
//! already been cleared and a fresh login is required.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiError {
    /// Network, DNS or timeout failure; never retried.
    #[error("transport: {message}")]
    Transport { message: String },
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("session expired: {reason}")]
    SessionExpired { reason: String },
    #[error("no refresh token")]
    NoRefreshToken,
    #[error("decode: {message}")]
    Decode { message: String },
    #[error("config: {message}")]
    Config { message: String },
    #[error("storage: {message}")]
    Storage { message: String },
}

impl ApiError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ApiError::Transport { .. } => "transport_error",
            ApiError::Http { .. } => "http_error",
            ApiError::SessionExpired { .. } => "session_expired",
            ApiError::NoRefreshToken => "no_refresh_token",
            ApiError::Decode { .. } => "decode_error",
            ApiError::Config { .. } => "config_error",
            ApiError::Storage { .. } => "storage_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Transport { message }
            | ApiError::Http { message, .. }
            | ApiError::Decode { message }
            | ApiError::Config { message }
            | ApiError::Storage { message } => message.clone(),
            ApiError::SessionExpired { reason } => reason.clone(),
            ApiError::NoRefreshToken => "no refresh token".to_string(),
        }
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self { ApiError::Transport { message: msg.into() } }
    pub fn decode<S: Into<String>>(msg: S) -> Self { ApiError::Decode { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { ApiError::Config { message: msg.into() } }
    pub fn storage<S: Into<String>>(msg: S) -> Self { ApiError::Storage { message: msg.into() } }
    pub fn session_expired<S: Into<String>>(reason: S) -> Self { ApiError::SessionExpired { reason: reason.into() } }

    /// Failure of a non-2xx response. An empty body falls back to `HTTP <status>`.
    pub fn http(status: u16, body: &str) -> Self {
        let message = if body.is_empty() { format!("HTTP {}", status) } else { body.to_string() };
        ApiError::Http { status, message }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::Decode { message: err.to_string() };
        }
        if err.is_builder() {
            return ApiError::Config { message: err.to_string() };
        }
        ApiError::Transport { message: err.to_string() }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode { message: err.to_string() }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Storage { message: err.to_string() }
    }
}
