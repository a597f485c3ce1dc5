//! Bridge configuration loading.
//!
//! Reads `naga-bridge.yaml` and resolves environment variables. Every field
//! has a default, so a missing file (or a partial one) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::errors::ClientError;

/// File name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "naga-bridge.yaml";

/// Env var naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "NAGA_BRIDGE_CONFIG";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Process-wide settings, supplied once at start.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// NagaAgent API host.
    pub api_host: String,
    /// NagaAgent API port.
    pub api_port: u16,
    /// Upper bound on tool-call → follow-up exchanges per turn.
    pub max_handoff_loop: u32,
    /// Send intermediate replies from the tool loop to the chat surface.
    pub show_handoff: bool,
    /// Activation prefix every user can use.
    pub default_prefix: String,
    /// Sessions idle longer than this are swept.
    pub session_timeout_secs: u64,
    /// How often the expiry sweep runs.
    pub sweep_interval_secs: u64,
    /// Use `POST /chat/stream` and assemble the fragments instead of `POST /chat`.
    pub use_streaming: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 8000,
            max_handoff_loop: 5,
            show_handoff: false,
            default_prefix: "#naga".to_string(),
            session_timeout_secs: 2 * 60 * 60,
            sweep_interval_secs: 5 * 60,
            use_streaming: false,
        }
    }
}

impl BridgeConfig {
    /// `http://{api_host}:{api_port}`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.api_host, self.api_port)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Reject values the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.api_host.trim().is_empty() {
            return Err(ClientError::ConfigError {
                reason: "api_host must not be empty".into(),
            });
        }
        if self.default_prefix.trim().is_empty() {
            return Err(ClientError::ConfigError {
                reason: "default_prefix must not be empty".into(),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ClientError::ConfigError {
                reason: "sweep_interval_secs must be positive".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Resolution order: `explicit` path, `NAGA_BRIDGE_CONFIG`, then
/// `naga-bridge.yaml` searched upward from `start`. Returns `None` when no
/// file exists (defaults apply).
pub fn find_config_path(explicit: Option<&Path>, start: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(path);
        if candidate.exists() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} points to a missing file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load and parse a config file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ClientError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ClientError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);
    if interpolated.trim().is_empty() {
        return Ok(BridgeConfig::default());
    }

    let config: BridgeConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ClientError::ConfigError {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?;

    config.validate()?;
    Ok(config)
}

/// Resolve and load the config, falling back to defaults when no file exists.
pub fn load_or_default(explicit: Option<&Path>) -> Result<BridgeConfig, ClientError> {
    let cwd = std::env::current_dir().unwrap_or_default();
    match find_config_path(explicit, &cwd) {
        Some(path) => {
            let config = load_config(&path)?;
            tracing::info!(path = %path.display(), "loaded bridge config");
            Ok(config)
        }
        None => {
            tracing::info!("no {CONFIG_FILE_NAME} found, using defaults");
            Ok(BridgeConfig::default())
        }
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => {
            std::env::var(var_name).unwrap_or_else(|_| default.to_string())
        }
        None => std::env::var(expr).unwrap_or_default(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
