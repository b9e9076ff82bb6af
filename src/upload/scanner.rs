// s3-offload/src/upload/scanner.rs
//! Lazy discovery of files at or above a size threshold.
//!
//! Entries are visited in file-name order so repeated scans of an unchanged tree yield
//! the same sequence. Relative paths use `/` separators on every platform, since they
//! become object keys.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{ConfigError, SIZE_THRESHOLD, SIZE_THRESHOLD_PATTERN};
use crate::errors::{AppError, Result};

/// A file eligible for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    /// Path below the scan root; used as the object key.
    pub relative_path: String,
    pub size: u64,
}

/// Converts a threshold such as `1m`, `1.5Gi` or `2048` into bytes.
///
/// `k`, `m` and `g` are powers of 1000; `ki`, `mi` and `gi` are powers of 1024.
pub fn parse_size_threshold(threshold: &str) -> std::result::Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: SIZE_THRESHOLD.to_string(),
        value: format!("{:?}", threshold),
    };

    let caps = SIZE_THRESHOLD_PATTERN.captures(threshold).ok_or_else(invalid)?;
    let number: f64 = caps[1].parse().map_err(|_| invalid())?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        None => 1.0,
        Some("k") => 1e3,
        Some("ki") => 1024.0,
        Some("m") => 1e6,
        Some("mi") => 1024.0 * 1024.0,
        Some("g") => 1e9,
        Some("gi") => 1024.0 * 1024.0 * 1024.0,
        Some(_) => return Err(invalid()),
    };

    Ok((number * multiplier).ceil() as u64)
}

pub struct Scanner {
    root: PathBuf,
    min_size: u64,
    limit: Option<usize>,
}

impl Scanner {
    /// `root` is assumed to be an existing directory; configuration validates it.
    pub fn new(root: &Path, min_size: u64, limit: Option<usize>) -> Self {
        Self {
            root: root.to_path_buf(),
            min_size,
            limit,
        }
    }

    pub fn scan(&self) -> Scan {
        Scan {
            root: self.root.clone(),
            walker: WalkDir::new(&self.root).sort_by_file_name().into_iter(),
            min_size: self.min_size,
            limit: self.limit,
            accepted: 0,
            done: false,
        }
    }
}

/// Finite, single-pass iterator over accepted candidates.
///
/// Stops walking as soon as `limit` candidates were accepted, or after the first error.
pub struct Scan {
    root: PathBuf,
    walker: walkdir::IntoIter,
    min_size: u64,
    limit: Option<usize>,
    accepted: usize,
    done: bool,
}

impl Scan {
    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.accepted >= limit)
    }

    fn candidate(&self, entry: walkdir::DirEntry) -> Result<Option<FileCandidate>> {
        if !entry.file_type().is_file() {
            return Ok(None);
        }
        let size = entry.metadata()?.len();
        if size < self.min_size {
            return Ok(None);
        }

        let relative = entry
            .path()
            .strip_prefix(&self.root)
            .map_err(std::io::Error::other)?
            .to_string_lossy()
            .replace('\\', "/");

        Ok(Some(FileCandidate {
            path: entry.into_path(),
            relative_path: relative,
            size,
        }))
    }
}

impl Iterator for Scan {
    type Item = Result<FileCandidate>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.limit_reached() {
            return None;
        }

        while let Some(entry) = self.walker.next() {
            let accepted = entry
                .map_err(AppError::from)
                .and_then(|entry| self.candidate(entry));
            match accepted {
                Ok(Some(candidate)) => {
                    self.accepted += 1;
                    return Some(Ok(candidate));
                }
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        None
    }
}
