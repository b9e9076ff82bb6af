// s3-offload/src/output/logging.rs
//! Log file destinations given as `[!]level:path` notations.
//!
//! `info:run.log` records info and error entries, `!info:run.log` records info entries only.

use regex::Regex;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};
use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry, fmt};

use super::LogLevel;
use crate::errors::{AppError, Result};

const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

static NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<exact>!?)(?P<level>debug|info|error):(?P<path>.+)$")
        .expect("log notation pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub level: LogLevel,
    /// Record only `level`, not `level` and above.
    pub exact: bool,
    pub path: PathBuf,
}

impl FromStr for LogTarget {
    type Err = AppError;

    fn from_str(notation: &str) -> Result<Self> {
        let invalid = || AppError::InvalidLogNotation(notation.to_string());
        let caps = NOTATION.captures(notation).ok_or_else(invalid)?;
        let level = caps["level"].parse::<LogLevel>().map_err(|_| invalid())?;
        Ok(LogTarget {
            level,
            exact: &caps["exact"] == "!",
            path: PathBuf::from(&caps["path"]),
        })
    }
}

impl LogTarget {
    fn accepts(&self, level: &tracing::Level) -> bool {
        let threshold = self.level.as_tracing();
        if self.exact {
            *level == threshold
        } else {
            // tracing orders levels by verbosity: ERROR < INFO < DEBUG.
            *level <= threshold
        }
    }
}

/// Installs the global subscriber: one file layer per target, plus stderr when `RUST_LOG` is set.
pub fn init_logging(targets: &[LogTarget]) -> Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    for target in targets {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target.path)?;
        let accepts = target.clone();
        let layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(filter_fn(move |meta| {
                meta.target().starts_with(CRATE_TARGET) && accepts.accepts(meta.level())
            }))
            .boxed();
        layers.push(layer);
    }

    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| AppError::Io(std::io::Error::other(e)))
}
