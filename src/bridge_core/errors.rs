//! Bridge core error types.

use thiserror::Error;

use crate::naga_api::ClientError;

/// Errors from Session Store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session with this name exists for the user.
    #[error("session not found: '{name}'")]
    NotFound { name: String },

    /// The user already has a session with this name.
    #[error("session name already in use: '{name}'")]
    DuplicateName { name: String },

    /// Every 6-digit placeholder id is taken.
    #[error("placeholder session id space exhausted")]
    IdSpaceExhausted,
}

impl SessionError {
    /// Text shown to the user, including how to fix the problem.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::NotFound { name } => format!(
                "❌ Session '{name}' not found. Use `session list` to see your sessions."
            ),
            SessionError::DuplicateName { name } => format!(
                "❌ A session named '{name}' already exists. Pick another name or `session switch {name}`."
            ),
            SessionError::IdSpaceExhausted => {
                "❌ No free session ids left. Delete unused sessions with `session delete <name>`."
                    .to_string()
            }
        }
    }
}

/// Terminal failure of one conversation turn.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The service could not be reached, or failed its health check.
    #[error("remote unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    /// The service answered with an HTTP error or an error status.
    #[error("remote error: {message}")]
    RemoteError { message: String },

    /// The service answered with something that is not the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The first chat reply had no text.
    #[error("empty reply")]
    EmptyReply,

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl TurnError {
    /// Text shown to the user when the turn ends with this error.
    ///
    /// Remote error messages are surfaced verbatim; malformed responses get a
    /// generic notice so raw payloads never reach the chat.
    pub fn user_message(&self) -> String {
        match self {
            TurnError::RemoteUnavailable { .. } => {
                "NagaAgent API server is not responding, please check that it is running".to_string()
            }
            TurnError::RemoteError { message } => format!("API call failed: {message}"),
            TurnError::MalformedResponse { .. } => "API response format error".to_string(),
            TurnError::EmptyReply => "API returned an empty reply".to_string(),
            TurnError::Session(e) => e.user_message(),
        }
    }
}

impl From<ClientError> for TurnError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::ConnectionFailed { .. }
            | ClientError::Timeout { .. }
            | ClientError::StreamError { .. }
            | ClientError::ConfigError { .. } => TurnError::RemoteUnavailable {
                reason: e.to_string(),
            },
            ClientError::HttpError { status, body } => TurnError::RemoteError {
                message: if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
            },
            ClientError::RemoteStatus { message } => TurnError::RemoteError { message },
            ClientError::MalformedResponse { reason } => TurnError::MalformedResponse { reason },
        }
    }
}
