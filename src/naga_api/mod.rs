//! NagaAgent API: HTTP client for the remote conversational service.
//!
//! This module handles all communication with the NagaAgent endpoint:
//! - Chat (plain and streaming `data: ` lines)
//! - Tool handoff via `/mcp/handoff`
//! - Dev-mode toggle and system info
//! - Tool-directive parsing from reply text
//! - Bridge configuration loading from `naga-bridge.yaml`
//!
//! The orchestrator only sees the [`ChatClient`] trait, so tests drive it
//! with a scripted client instead of a live server.

pub mod client;
pub mod config;
pub mod directive_parser;
pub mod errors;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use client::{ChatClient, NagaClient, SystemClient};
pub use config::BridgeConfig;
pub use directive_parser::parse_directive;
pub use errors::ClientError;
pub use types::{ChatReply, SystemInfo, ToolDirective, ToolResult};
