//! Session admin commands: `session list|create|switch|delete|rename|clear|info`.
//!
//! These operate on the Session Store only. They never touch the remote
//! service and never enter the tool loop.

use crate::bridge_core::{SessionStore, SessionView, TurnError, TurnOutcome};

/// Time format used in listings.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A parsed `session …` sub-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    List,
    Create { name: String },
    Switch { name: String },
    Delete { name: String },
    Rename { old: String, new: String },
    Clear,
    Info,
    Help,
    /// Anything else, kept for the help message.
    Unknown { input: String },
}

/// Parse the text after the `session` keyword.
pub fn parse_session_command(args: &str) -> SessionCommand {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        [] | ["help"] => SessionCommand::Help,
        ["list"] => SessionCommand::List,
        ["create", name] => SessionCommand::Create {
            name: name.to_string(),
        },
        ["switch", name] => SessionCommand::Switch {
            name: name.to_string(),
        },
        ["delete", name] => SessionCommand::Delete {
            name: name.to_string(),
        },
        ["rename", old, new] => SessionCommand::Rename {
            old: old.to_string(),
            new: new.to_string(),
        },
        ["clear"] => SessionCommand::Clear,
        ["info"] => SessionCommand::Info,
        _ => SessionCommand::Unknown {
            input: args.trim().to_string(),
        },
    }
}

/// Parse and run a `session …` command for `user_id`.
pub fn handle_session_command(store: &SessionStore, user_id: &str, args: &str) -> TurnOutcome {
    let command = parse_session_command(args);
    tracing::debug!(user_id, command = ?command, "session command");
    execute(store, user_id, command)
}

pub fn execute(store: &SessionStore, user_id: &str, command: SessionCommand) -> TurnOutcome {
    let result = match command {
        SessionCommand::List => Ok(render_list(&store.list(user_id))),
        SessionCommand::Create { name } => store
            .create(user_id, &name)
            .map(|_| format!("✅ Created session '{name}' (now active)")),
        SessionCommand::Switch { name } => store
            .set_active(user_id, &name)
            .map(|_| format!("✅ Switched to session '{name}'")),
        SessionCommand::Delete { name } => store
            .delete(user_id, &name)
            .map(|_| format!("✅ Deleted session '{name}'")),
        SessionCommand::Rename { old, new } => store
            .rename(user_id, &old, &new)
            .map(|_| format!("✅ Renamed session '{old}' to '{new}'")),
        SessionCommand::Clear => {
            let removed = store.clear(user_id);
            Ok(format!("✅ Cleared {removed} session(s)"))
        }
        SessionCommand::Info => Ok(render_info(&store.list(user_id))),
        SessionCommand::Help => Ok(help_text()),
        SessionCommand::Unknown { input } => {
            Ok(format!("Unknown session command: '{input}'\n{}", help_text()))
        }
    };

    match result {
        Ok(text) => TurnOutcome::Reply(text),
        Err(e) => TurnOutcome::Failed(TurnError::Session(e)),
    }
}

// ─── Rendering ──────────────────────────────────────────────────────────────

fn render_list(sessions: &[SessionView]) -> String {
    if sessions.is_empty() {
        return "No sessions yet. Send a message to start one, or use `session create <name>`."
            .to_string();
    }

    let mut text = String::from("Sessions:");
    for s in sessions {
        let marker = if s.active { '*' } else { ' ' };
        text.push_str(&format!(
            "\n{marker} {} [{}] last used {}",
            s.name,
            s.id.as_deref().unwrap_or("-"),
            s.last_used_at.format(TIME_FORMAT)
        ));
    }
    text
}

fn render_info(sessions: &[SessionView]) -> String {
    let Some(active) = sessions.iter().find(|s| s.active) else {
        return format!(
            "No active session ({} in total). Use `session switch <name>` to pick one.",
            sessions.len()
        );
    };

    format!(
        "Active session: {}\n  id: {}\n  created: {}\n  last used: {}\n  total sessions: {}",
        active.name,
        active.id.as_deref().unwrap_or("(assigned on first message)"),
        active.created_at.format(TIME_FORMAT),
        active.last_used_at.format(TIME_FORMAT),
        sessions.len()
    )
}

fn help_text() -> String {
    [
        "Session commands:",
        "  session list                 list your sessions (* = active)",
        "  session create <name>        create a session and switch to it",
        "  session switch <name>        make a session active",
        "  session delete <name>        delete a session",
        "  session rename <old> <new>   rename a session",
        "  session clear                delete all your sessions",
        "  session info                 show the active session",
    ]
    .join("\n")
}

// ─── Tests ──────────────────────────────────────────────────────────────────
