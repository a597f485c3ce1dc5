//! Activation prefixes.
//!
//! Every message addressed to the bridge starts with the default prefix
//! (`#naga`) or the user's own override set via `activate <prefix>`.
//! Overrides live in memory for the life of the process.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub struct PrefixRegistry {
    default_prefix: String,
    overrides: Mutex<HashMap<String, String>>,
}

impl PrefixRegistry {
    pub fn new(default_prefix: impl Into<String>) -> Self {
        Self {
            default_prefix: default_prefix.into(),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    /// Set (or replace) the user's override.
    pub fn set(&self, user_id: &str, prefix: &str) {
        let mut overrides = self.overrides.lock().unwrap_or_else(PoisonError::into_inner);
        overrides.insert(user_id.to_string(), prefix.to_string());
        tracing::info!(user_id, prefix, "custom activation prefix set");
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        let overrides = self.overrides.lock().unwrap_or_else(PoisonError::into_inner);
        overrides.get(user_id).cloned()
    }

    /// Strip the activation prefix from a message.
    ///
    /// The default prefix is tried first, then the user's override. Returns
    /// the remainder with leading whitespace removed, or `None` when the
    /// message is not addressed to the bridge.
    pub fn strip(&self, user_id: &str, text: &str) -> Option<String> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix(self.default_prefix.as_str()) {
            return Some(rest.trim_start().to_string());
        }

        let custom = self.get(user_id)?;
        text.strip_prefix(custom.as_str())
            .map(|rest| rest.trim_start().to_string())
    }
}
