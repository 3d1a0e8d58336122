//! Tracing subscriber setup
// (c) 2026 OpenNetty contributors

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context as _;
use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Environment variable that controls what gets logged.
const STANDARD_ENV_VAR: &str = "RUST_LOG";

/// Whether [`setup`] has already installed a global subscriber.
#[must_use]
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::Relaxed)
}

/// Installs a `tracing_subscriber` writing to stderr. Honors `RUST_LOG` if
/// set and valid; otherwise falls back to `opennetty={trace_level}` so
/// dependency noise stays quiet by default.
pub fn setup(trace_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(STANDARD_ENV_VAR).or_else(|e| {
        if std::env::var(STANDARD_ENV_VAR).is_ok() {
            anyhow::bail!("{STANDARD_ENV_VAR} (set in environment) was not understood: {e}");
        }
        EnvFilter::try_new(format!("opennetty={trace_level}")).context("building default filter")
    })?;

    fmt().with_env_filter(filter).with_target(true).try_init().map_err(|e| anyhow::anyhow!("{e}"))?;
    TRACING_INITIALIZED.store(true, Ordering::Relaxed);
    Ok(())
}
