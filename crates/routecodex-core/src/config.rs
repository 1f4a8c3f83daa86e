use std::path::PathBuf;

use clap::Parser;

/// The typed CLI/env boundary for everything the core itself needs to
/// start (§6, SPEC_FULL §2 Configuration). Config-file loading (providers,
/// credentials, routes) stays outside the core per §1; this only covers
/// bind address, data directories, and the handful of runtime knobs.
#[derive(Debug, Clone, Parser)]
#[command(name = "routecodex", version, about = "RouteCodex gateway core")]
pub struct RuntimeConfig {
    /// Bind host for the HTTP gateway.
    #[arg(long, env = "ROUTECODEX_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Bind port for the HTTP gateway.
    #[arg(long, env = "ROUTECODEX_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Data directory root. Defaults to `~/.routecodex` (§6).
    #[arg(long, env = "ROUTECODEX_USER_DIR")]
    pub user_dir: Option<PathBuf>,

    /// Overrides `<userDir>/quota` for the snapshot/error-log files (§6).
    #[arg(long, env = "ROUTECODEX_QUOTA_DIR")]
    pub quota_dir: Option<PathBuf>,

    /// Reserved, ignored by the core (§6).
    #[arg(long, env = "ROUTECODEX_WASM_MODE")]
    pub wasm_mode: Option<String>,

    /// Max attempts per inbound request before `FailoverExecutor` gives up (§4.7).
    #[arg(long, env = "ROUTECODEX_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: usize,

    /// How often C9 writes the quota snapshot to disk, in seconds (§4.9).
    #[arg(long, env = "ROUTECODEX_SNAPSHOT_INTERVAL_SECS", default_value_t = 5)]
    pub snapshot_interval_secs: u64,

    /// How often C3's ticker sweeps window/cooldown expiry, in seconds (§4.3).
    #[arg(long, env = "ROUTECODEX_TICK_INTERVAL_SECS", default_value_t = 1)]
    pub tick_interval_secs: u64,

    /// Bounds the `ProviderQuotaCenter` command channel (§5).
    #[arg(long, env = "ROUTECODEX_QUOTA_CHANNEL_CAPACITY", default_value_t = 1024)]
    pub quota_channel_capacity: usize,

    /// Enables shadow-run fan-out: a second `HubPipeline` invocation per
    /// request whose result is diffed against the primary but never
    /// returned to the client (§9 design notes).
    #[arg(long, env = "ROUTECODEX_SHADOW_RUN")]
    pub shadow_run: bool,
}

impl RuntimeConfig {
    /// `~/.routecodex`, or `user_dir` if set (§6).
    pub fn resolved_user_dir(&self) -> PathBuf {
        self.user_dir.clone().unwrap_or_else(default_user_dir)
    }

    /// `<userDir>/quota`, or `quota_dir` if set (§6).
    pub fn resolved_quota_dir(&self) -> PathBuf {
        self.quota_dir
            .clone()
            .unwrap_or_else(|| self.resolved_user_dir().join("quota"))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.resolved_quota_dir().join("provider-quota.json")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.resolved_quota_dir().join("provider-errors.ndjson")
    }
}

fn default_user_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".routecodex")
}
