//! Error types for the Tiny Tiny RSS API client.
//!
//! # Design
//! Two families are kept apart. Transport-level failures (`Transport`,
//! `Timeout`, `HttpError`, `Deserialization`) mean no well-formed envelope
//! came back. `Api` means the server answered with an envelope whose
//! `content.error` named an application error; the request reached the
//! server and was refused.

use std::fmt;

use thiserror::Error;

/// Errors returned by `TtRssClient` and `Session`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be completed (DNS, connection refused, TLS, I/O).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The round-trip exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server returned a non-200 status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The server rejected the operation with an error code.
    #[error("server error: {0}")]
    Api(RemoteError),
}

impl ApiError {
    /// True when the failure happened below the API envelope.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_) | ApiError::Timeout | ApiError::HttpError { .. } | ApiError::Deserialization(_)
        )
    }

    /// The remote error code, if the server refused the operation.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ApiError::Api(code) => Some(code),
            _ => None,
        }
    }
}

/// Application error codes carried in `content.error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// API access is disabled for this account.
    ApiDisabled,
    /// Username or password rejected.
    LoginError,
    /// The session id is missing, expired, or was logged out.
    NotLoggedIn,
    /// The `op` is not known to this server version.
    UnknownMethod,
    /// Required parameters missing or malformed.
    IncorrectUsage,
    Other(String),
}

impl RemoteError {
    pub fn from_code(code: &str) -> Self {
        match code {
            "API_DISABLED" => RemoteError::ApiDisabled,
            "LOGIN_ERROR" => RemoteError::LoginError,
            "NOT_LOGGED_IN" => RemoteError::NotLoggedIn,
            "UNKNOWN_METHOD" => RemoteError::UnknownMethod,
            "INCORRECT_USAGE" => RemoteError::IncorrectUsage,
            other => RemoteError::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            RemoteError::ApiDisabled => "API_DISABLED",
            RemoteError::LoginError => "LOGIN_ERROR",
            RemoteError::NotLoggedIn => "NOT_LOGGED_IN",
            RemoteError::UnknownMethod => "UNKNOWN_METHOD",
            RemoteError::IncorrectUsage => "INCORRECT_USAGE",
            RemoteError::Other(code) => code,
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip() {
        for code in ["API_DISABLED", "LOGIN_ERROR", "NOT_LOGGED_IN", "UNKNOWN_METHOD", "INCORRECT_USAGE"] {
            assert_eq!(RemoteError::from_code(code).code(), code);
        }
    }

    #[test]
    fn unknown_code_is_preserved() {
        let err = RemoteError::from_code("FEED_NOT_FOUND");
        assert_eq!(err, RemoteError::Other("FEED_NOT_FOUND".to_string()));
        assert_eq!(err.to_string(), "FEED_NOT_FOUND");
    }

    #[test]
    fn api_errors_are_not_transport_errors() {
        assert!(!ApiError::Api(RemoteError::NotLoggedIn).is_transport());
        assert!(ApiError::Timeout.is_transport());
        assert!(ApiError::HttpError { status: 502, body: String::new() }.is_transport());
    }
}
