//! `activate <prefix>`: set a per-user activation prefix.

use crate::bridge_core::{PrefixRegistry, TurnOutcome};

pub fn activate(registry: &PrefixRegistry, user_id: &str, args: &str) -> TurnOutcome {
    let prefix = args.trim();
    if prefix.is_empty() {
        return TurnOutcome::Reply("❌ Please provide a valid prefix".to_string());
    }

    registry.set(user_id, prefix);
    TurnOutcome::Reply(format!("✅ Custom activation prefix set to: {prefix}"))
}
