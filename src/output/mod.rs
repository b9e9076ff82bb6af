// s3-offload/src/output/mod.rs
//! Human-readable console output, structured logging and progress tracking behind one sink.
//!
//! Messages may carry two placeholders, expanded after the caller has substituted its
//! arguments:
//!
//! * `{count:N}` renders `N` with thousands separators (`{count:12345}` -> `12,345`).
//! * `{pluralize:N:word}` renders `word` when `N` is 1 and `words` otherwise.
//!
//! Counts are expanded before plurals, so both can reference the same number.

pub mod logging;
pub mod progress;

use regex::{Captures, Regex};
use std::str::FromStr;
use std::sync::LazyLock;

pub use progress::{IndicatifProgress, NoProgress, Progress, ProgressObserver, TrackProgress};

static COUNT_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{count:(-?\d+)\}").expect("count placeholder pattern is valid")
});

static PLURALIZE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{pluralize:(\d+):(.+?)\}").expect("pluralize placeholder pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl LogLevel {
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Line-oriented terminal capability.
pub trait Console: Send + Sync {
    fn write_line(&self, line: &str);

    fn is_verbose(&self) -> bool;

    /// Observer used to visualise progress on this console.
    fn progress(&self) -> Box<dyn ProgressObserver> {
        Box::new(NoProgress)
    }
}

/// Structured log capability. Records everything it is given.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Standard output console with an `indicatif` progress bar on stderr.
#[derive(Debug, Clone, Default)]
pub struct Terminal {
    verbose: bool,
}

impl Terminal {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Console for Terminal {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn progress(&self) -> Box<dyn ProgressObserver> {
        Box::new(IndicatifProgress::default())
    }
}

/// Forwards sink messages to `tracing`, where `--log` destinations pick them up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }
}

/// Output sink shared by the scanner and the upload pipeline.
///
/// Either side may be absent: no console gives headless operation, no log sink gives
/// console-only operation, neither gives silence.
pub struct Output {
    console: Option<Box<dyn Console>>,
    log: Option<Box<dyn LogSink>>,
    mute_console_exceptions: bool,
}

impl Output {
    pub fn new(console: Option<Box<dyn Console>>, log: Option<Box<dyn LogSink>>) -> Self {
        Self {
            console,
            log,
            mute_console_exceptions: false,
        }
    }

    pub fn silent() -> Self {
        Self::new(None, None)
    }

    /// Keeps exceptions off the console, for callers that print their own failure message.
    pub fn mute_console_exceptions(mut self, mute: bool) -> Self {
        self.mute_console_exceptions = mute;
        self
    }

    pub fn has_log_sink(&self) -> bool {
        self.log.is_some()
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        let message = format_message(message.as_ref());
        if let Some(console) = self.console.as_ref().filter(|c| c.is_verbose()) {
            console.write_line(&message);
        }
        if let Some(log) = &self.log {
            log.log(LogLevel::Debug, &message);
        }
    }

    pub fn success(&self, message: impl AsRef<str>) {
        let message = format_message(message.as_ref());
        if let Some(console) = &self.console {
            console.write_line(&format!("✅ {}", message));
        }
        if let Some(log) = &self.log {
            log.log(LogLevel::Info, &message);
        }
    }

    /// Records a failure. The caller still owns the error and is expected to propagate it.
    pub fn exception(&self, err: &(dyn std::error::Error + 'static)) {
        if let Some(console) = self.console.as_ref().filter(|_| !self.mute_console_exceptions) {
            console.write_line(&format!("❌ {}", err));
        }
        if let Some(log) = &self.log {
            log.log(LogLevel::Error, &err.to_string());
        }
    }

    /// Starts a progress indicator; `len` sizes it when known.
    pub fn progress(&self, len: Option<u64>) -> Progress {
        let observer = match &self.console {
            Some(console) => console.progress(),
            None => Box::new(NoProgress),
        };
        Progress::start(observer, len)
    }

    /// Passes `iter` through unchanged while advancing a progress indicator per item.
    pub fn track_progress<I: Iterator>(&self, iter: I) -> TrackProgress<I> {
        let len = match iter.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(lower as u64),
            _ => None,
        };
        TrackProgress::new(iter, self.progress(len))
    }
}

/// Expands `{count:N}` and then `{pluralize:N:word}` placeholders.
pub fn format_message(message: &str) -> String {
    let counted = COUNT_PLACEHOLDER.replace_all(message, |caps: &Captures| {
        caps[1]
            .parse::<i64>()
            .map(group_thousands)
            .unwrap_or_else(|_| caps[1].to_string())
    });
    PLURALIZE_PLACEHOLDER
        .replace_all(&counted, |caps: &Captures| {
            let word = &caps[2];
            match caps[1].parse::<u64>() {
                Ok(1) => word.to_string(),
                _ => format!("{}s", word),
            }
        })
        .into_owned()
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
