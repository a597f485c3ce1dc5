//! Shared types for the bridge core.
//!
//! Session records, the views handed out by the Session Store, and the
//! terminal outcome of a conversation turn.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::TurnError;

// ─── Sessions ───────────────────────────────────────────────────────────────

/// Name given to the session auto-created on a user's first turn.
pub const DEFAULT_SESSION_NAME: &str = "default";

/// A named conversation session owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Remote session identifier. Unset until a placeholder is generated or
    /// the server assigns one.
    pub id: Option<String>,
    /// Platform-qualified owner, e.g. `console:alice`.
    pub user_id: String,
    /// User-chosen label, unique per user.
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(user_id: &str, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: now,
            last_used_at: now,
        }
    }
}

/// One row of a session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub name: String,
    pub id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Whether this is the user's active session.
    pub active: bool,
}

/// The session a turn runs against, as decided by `resolve_for_turn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSession {
    pub name: String,
    /// Always non-empty: a placeholder is generated when the session had none.
    pub id: String,
    /// The session was auto-created for this turn.
    pub created: bool,
}

// ─── Turn outcome ───────────────────────────────────────────────────────────

/// How a turn (or a command) ended.
///
/// `Reply` is the normal "turn complete" signal and is never logged as a
/// failure.
#[derive(Debug)]
pub enum TurnOutcome {
    Reply(String),
    Failed(TurnError),
}

impl TurnOutcome {
    pub fn is_reply(&self) -> bool {
        matches!(self, TurnOutcome::Reply(_))
    }

    /// Text sent to the chat surface.
    pub fn text(&self) -> String {
        match self {
            TurnOutcome::Reply(text) => text.clone(),
            TurnOutcome::Failed(e) => e.user_message(),
        }
    }
}

impl From<TurnError> for TurnOutcome {
    fn from(e: TurnError) -> Self {
        TurnOutcome::Failed(e)
    }
}
