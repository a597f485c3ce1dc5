pub mod bridge_core;
pub mod commands;
pub mod naga_api;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;

use bridge_core::{spawn_expiry_sweep, ReplySink, SessionStore};
use commands::Bridge;
use naga_api::NagaClient;

/// Platform qualifier for users arriving over the console channel.
const CONSOLE_PLATFORM: &str = "console";

/// Return the platform-standard data directory for the bridge.
///
/// - macOS: `~/Library/Application Support/naga-bridge/`
/// - Windows: `{FOLDERID_RoamingAppData}\naga-bridge\`
/// - Linux: `$XDG_DATA_HOME/naga-bridge/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.naga-bridge/` only if none of the above can be resolved.
pub(crate) fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("naga-bridge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".naga-bridge")
}

/// Initialize the tracing subscriber, writing structured logs to the data directory.
///
/// On each startup:
/// 1. Rotates existing logs (bridge.log → bridge.log.1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh bridge.log with a line-flushing writer for crash resilience.
/// 3. Logs a startup banner with the data directory path for discoverability.
fn init_tracing() -> anyhow::Result<PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let log_path = log_dir.join("bridge.log");

    // Rotate: bridge.log.2 → .3, .1 → .2, bridge.log → .1
    rotate_log_file(&log_path, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("naga_bridge=info,warn"));

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    // Startup banner: makes it easy to find the right log file
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== naga-bridge starting ==="
    );

    Ok(log_path)
}

/// Rotate log files: `bridge.log` → `bridge.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// Without explicit flushing, log entries may sit in OS buffers and be lost
/// if the process is killed.
#[derive(Clone)]
struct FlushingWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ─── Console channel ────────────────────────────────────────────────────────

/// Startup options for [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Explicit config file; otherwise the env var and upward search apply.
    pub config_path: Option<PathBuf>,
    /// User for lines that do not start with `<user>:`.
    pub default_user: String,
}

/// Prints outbound messages to stdout.
struct ConsoleSink;

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn send(&self, text: &str) {
        println!("naga> {text}");
    }
}

/// Split a console line into a platform-qualified user id and the message.
///
/// `alice: #naga hi` is sent as `console:alice`; a line without a leading
/// single-word `<user>:` is sent as `default_user`.
fn parse_console_line(line: &str, default_user: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (user, text) = match line.split_once(':') {
        Some((user, text)) if is_user_name(user) => (user, text.trim()),
        _ => (default_user, line),
    };
    Some((format!("{CONSOLE_PLATFORM}:{user}"), text.to_string()))
}

fn is_user_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Run the bridge on the console channel until stdin closes.
///
/// Each input line is one inbound chat message. Messages are handled
/// concurrently; the session expiry sweep runs in the background.
pub async fn run(options: RunOptions) -> anyhow::Result<()> {
    // Initialize tracing FIRST, before any tracing::info!() calls
    let log_path = init_tracing()?;

    let config = naga_api::config::load_or_default(options.config_path.as_deref())
        .context("failed to load bridge config")?;
    let client = Arc::new(NagaClient::from_config(&config)?);
    tracing::info!(
        base_url = client.base_url(),
        max_handoff_loop = config.max_handoff_loop,
        show_handoff = config.show_handoff,
        use_streaming = config.use_streaming,
        "NagaAgent client configured"
    );

    let store = Arc::new(SessionStore::new());
    let sweep = spawn_expiry_sweep(
        Arc::clone(&store),
        config.sweep_interval(),
        config.session_timeout(),
    );

    let bridge = Arc::new(Bridge::new(&config, client.clone(), client, store));
    let sink = Arc::new(ConsoleSink);

    eprintln!(
        "naga-bridge ready. Type `{} <message>` (logs: {}).",
        config.default_prefix,
        log_path.display()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turns = JoinSet::new();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let Some((user_id, text)) = parse_console_line(&line, &options.default_user) else {
            continue;
        };
        let bridge = Arc::clone(&bridge);
        let sink = Arc::clone(&sink);
        turns.spawn(async move {
            if bridge.handle_message(&user_id, &text, sink.as_ref()).await.is_none() {
                tracing::debug!(user_id = %user_id, "message ignored (no activation prefix)");
            }
        });

        // Reap finished turns so the set does not grow unbounded.
        while let Some(joined) = turns.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "turn task failed");
            }
        }
    }

    while let Some(joined) = turns.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "turn task failed");
        }
    }

    sweep.abort();
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
