//! Tracing subscriber setup.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `level` when set. A second call leaves the first
/// subscriber in place and returns `Ok`.
pub fn init_logging(level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow::anyhow!("Failed to create log filter: {}", e))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true);

    if Registry::default()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        info!(level, "logging initialized");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        assert!(init_logging("debug").is_ok());
        assert!(init_logging("info").is_ok());
    }
}
