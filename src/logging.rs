// Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG` when set, else `level` for this crate and `warn`
/// for everything else.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,ytdl_relay={},tower_http={}", level, level)))
}

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init();
}
