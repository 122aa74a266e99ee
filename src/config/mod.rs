use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4310;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── StreamConfig ─────────────────────────────────────────────────────────────

/// Event-stream configuration (`[stream]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum simultaneous SSE connections per user per household (default: 3).
    pub max_streams_per_user: usize,
    /// Keep-alive ping interval in seconds (default: 15).
    pub heartbeat_secs: u64,
    /// Reconnect-interval hint sent in the `hello` event, milliseconds (default: 3000).
    pub reconnect_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_streams_per_user: 3,
            heartbeat_secs: 15,
            reconnect_ms: 3000,
        }
    }
}

// ─── ObservabilityConfig ─────────────────────────────────────────────────────

/// Daemon observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── HearthConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HearthConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Log level filter string, e.g. "debug", "info,hearthd=trace".
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Bind address for the HTTP server (default: "127.0.0.1").
    pub bind_address: String,
    pub stream: StreamConfig,
    pub observability: ObservabilityConfig,
}

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 4310).
    port: Option<u16>,
    /// Log level filter string (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" | "json".
    log_format: Option<String>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Event-stream configuration (`[stream]`).
    stream: Option<StreamConfig>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

impl HearthConfig {
    /// Resolve the effective configuration.
    ///
    /// Priority per field:
    ///   1. CLI flag / env var (already merged by clap)
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in default
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        Self {
            port: port.or(toml.port).unwrap_or(DEFAULT_PORT),
            log: log.or(toml.log).unwrap_or_else(|| "info".to_string()),
            log_format: std::env::var("HEARTHD_LOG_FORMAT")
                .ok()
                .or(toml.log_format)
                .unwrap_or_else(|| "pretty".to_string()),
            bind_address: bind_address
                .or(toml.bind_address)
                .unwrap_or_else(default_bind_address),
            stream: toml.stream.unwrap_or_default(),
            observability: toml.observability.unwrap_or_default(),
            data_dir,
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HEARTHD_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/hearthd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("hearthd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/hearthd or ~/.local/share/hearthd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("hearthd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("hearthd");
        }
    }
    PathBuf::from(".hearthd")
}
