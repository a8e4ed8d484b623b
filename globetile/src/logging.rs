//! Tracing subscriber installation.
//!
//! The library itself only emits `tracing` events; binaries decide where
//! they go. The CLI calls [`init`] once at startup.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a formatting subscriber. `default_filter` applies when
/// `RUST_LOG` is unset (e.g. `"globetile=debug"`). Returns whether a
/// subscriber was installed (false when one already was).
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_already_installed() {
        // Whichever test in the process installed the global subscriber
        // first, a repeated init must not panic and must report failure.
        let _ = init("info");
        assert!(!init("info"));
    }
}
