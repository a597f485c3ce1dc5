//! Chat commands: everything a user can type after the activation prefix.
//!
//! [`message::Bridge`] is the single entry point; the other modules hold
//! the individual command families it dispatches to.

pub mod message;
pub mod prefix;
pub mod session;
pub mod system;

pub use message::Bridge;
