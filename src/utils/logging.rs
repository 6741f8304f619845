//! tracing 日志初始化

use tracing_subscriber::EnvFilter;

use crate::error::{ArchiveError, Result};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Calling this more than once keeps
/// the first subscriber.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| ArchiveError::config(format!("invalid log level '{}': {}", level, e)))?,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
