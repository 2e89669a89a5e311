//! Environment-driven daemon configuration.
//!
//! Front-ends own their configuration files; the daemon itself reads its
//! few knobs from the environment so deployments can place the socket and
//! tune behavior without a config format of their own.

use std::path::PathBuf;
use std::time::Duration;

const SOCKET_ENV: &str = "LANTERN_SOCKET";
const HEALTHCHECK_ENV: &str = "LANTERN_HEALTHCHECK_MS";
const MAX_GLOBAL_WEBSEARCH_ENV: &str = "LANTERN_MAX_GLOBAL_WEBSEARCH";

#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the daemon's Unix stream socket.
    pub socket_path: PathBuf,
    /// Interval between subscription liveness probes; `None` disables the
    /// probe loop.
    pub healthcheck_interval: Option<Duration>,
    /// Result count above which generic websearch items are hidden in
    /// multi-provider views. Provider setup may raise it later.
    pub max_global_websearch_items: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            socket_path: env_value(SOCKET_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(default_socket_path),
            healthcheck_interval: env_value(HEALTHCHECK_ENV)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            max_global_websearch_items: env_value(MAX_GLOBAL_WEBSEARCH_ENV)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `$XDG_RUNTIME_DIR/lantern/lantern.sock`, falling back to the user
/// cache dir, then the system temp dir.
pub(crate) fn default_socket_path() -> PathBuf {
    let base = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir);
    base.join("lantern").join("lantern.sock")
}
