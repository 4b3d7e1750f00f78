use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

use crate::errors::{GenerationError, Result};

/// Where log events go.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Human-readable lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File(PathBuf),
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when set. Fails if a
/// subscriber is already installed.
pub fn init_logging(target: &LogTarget, default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|err| GenerationError::Logging(err.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match target {
        LogTarget::Stderr => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_timer(UtcTime::rfc_3339())
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
    };
    installed.map_err(|err| GenerationError::Logging(err.to_string()))
}
