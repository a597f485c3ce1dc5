//! Bridge Core: session-scoped conversation orchestration.
//!
//! Submodules:
//! - `session_store`: per-user named sessions, placeholder ids, expiry sweep
//! - `orchestrator`: one turn through chat and the bounded tool loop
//! - `prefixes`: activation prefixes (default plus per-user override)
//! - `health`: lazy single-shot health check of the remote service
//! - `types`: sessions and turn outcomes
//! - `errors`: session and turn error types

pub mod errors;
pub mod health;
pub mod orchestrator;
pub mod prefixes;
pub mod session_store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use errors::{SessionError, TurnError};
pub use health::HealthGate;
pub use orchestrator::{LoopSettings, Orchestrator, ReplySink};
pub use prefixes::PrefixRegistry;
pub use session_store::{spawn_expiry_sweep, SessionStore};
pub use types::{ResolvedSession, Session, SessionView, TurnOutcome};
