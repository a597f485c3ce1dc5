//! Server administration commands: `devmode on|off` and `sysinfo`.

use crate::bridge_core::{TurnError, TurnOutcome};
use crate::naga_api::SystemClient;

/// A parsed system command, if the message is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    DevMode { enabled: bool },
    SysInfo,
}

pub fn parse_system_command(body: &str) -> Option<SystemCommand> {
    match body {
        "devmode on" => Some(SystemCommand::DevMode { enabled: true }),
        "devmode off" => Some(SystemCommand::DevMode { enabled: false }),
        "sysinfo" => Some(SystemCommand::SysInfo),
        _ => None,
    }
}

pub async fn execute(client: &dyn SystemClient, command: SystemCommand) -> TurnOutcome {
    match command {
        SystemCommand::DevMode { enabled } => match client.toggle_developer_mode(enabled).await {
            Ok(()) => {
                let state = if enabled { "enabled" } else { "disabled" };
                TurnOutcome::Reply(format!("✅ Developer mode {state}"))
            }
            Err(e) => {
                tracing::error!(enabled, error = %e, "developer mode toggle failed");
                TurnOutcome::Failed(TurnError::from(e))
            }
        },
        SystemCommand::SysInfo => match client.system_info().await {
            Ok(info) => TurnOutcome::Reply(info.render()),
            Err(e) => {
                tracing::error!(error = %e, "system info request failed");
                TurnOutcome::Failed(TurnError::from(e))
            }
        },
    }
}
