//! Tracing initialization.
//!
//! Sets up `tracing-subscriber` with a console fmt layer. The filter comes
//! from `RUST_LOG` when set and defaults to `info`, so a deployment can turn
//! on `debug` for a single module without a rebuild:
//!
//! ```bash
//! RUST_LOG=duebook::billing=debug,info duebook
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// Errors if a subscriber is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");

    Ok(())
}
