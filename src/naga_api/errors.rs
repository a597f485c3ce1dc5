//! NagaAgent API error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility. These types carry the context needed to
//! build meaningful log entries and user-facing messages.

use thiserror::Error;

/// Errors that can occur while talking to the NagaAgent API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP/HTTP connection to the API failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed {
        endpoint: String,
        reason: String,
    },

    /// The API did not respond within the configured timeout.
    #[error("request timeout after {duration_secs}s")]
    Timeout {
        duration_secs: u64,
    },

    /// Non-2xx HTTP response.
    #[error("HTTP {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
    },

    /// The API answered 2xx but reported `"status": "error"` in the body.
    #[error("remote error: {message}")]
    RemoteStatus {
        message: String,
    },

    /// The response body was not JSON or did not have the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse {
        reason: String,
    },

    /// Streaming (`data: ` line) read error.
    #[error("stream error: {reason}")]
    StreamError {
        reason: String,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl ClientError {
    /// Whether the remote service could not be reached at all.
    ///
    /// Connection failures and timeouts mean the service is down or
    /// unreachable, as opposed to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionFailed { .. } | ClientError::Timeout { .. }
        )
    }

    /// The message the remote side reported, if this error carries one.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ClientError::HttpError { body, .. } => Some(body),
            ClientError::RemoteStatus { message } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unreachable() {
        assert!(ClientError::ConnectionFailed {
            endpoint: "http://127.0.0.1:8000/chat".into(),
            reason: "refused".into(),
        }
        .is_unreachable());
        assert!(ClientError::Timeout { duration_secs: 30 }.is_unreachable());
        assert!(!ClientError::HttpError {
            status: 500,
            body: "boom".into(),
        }
        .is_unreachable());
        assert!(!ClientError::MalformedResponse {
            reason: "not json".into(),
        }
        .is_unreachable());
    }

    #[test]
    fn test_remote_message() {
        let err = ClientError::RemoteStatus {
            message: "model overloaded".into(),
        };
        assert_eq!(err.remote_message(), Some("model overloaded"));

        let err = ClientError::HttpError {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(err.remote_message(), Some("bad gateway"));

        assert!(ClientError::Timeout { duration_secs: 5 }
            .remote_message()
            .is_none());
    }

    #[test]
    fn test_display_formats() {
        let err = ClientError::HttpError {
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: not found");
    }
}
