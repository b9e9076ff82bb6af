// s3-offload/src/config/mod.rs
pub mod spec;

use regex::Regex;
use serde_json::Map;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

pub use spec::{Filter, SpecType, Value, ValueSpec};

pub const PATH: &str = "path";
pub const SIZE_THRESHOLD: &str = "size-threshold";
pub const DELETE: &str = "delete";
pub const LIMIT: &str = "limit";
pub const SKIP_UP_TO_DATE: &str = "skip-up-to-date";
pub const S3_REGION: &str = "s3-region";
pub const S3_BUCKET: &str = "s3-bucket";
pub const S3_KEY: &str = "s3-key";
pub const S3_SECRET: &str = "s3-secret";

/// Numeric size with an optional decimal (`k`, `m`, `g`) or binary (`ki`, `mi`, `gi`) unit.
pub(crate) static SIZE_THRESHOLD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([0-9.]+)\s*([kmg]i?)?\s*$").expect("size threshold pattern is valid")
});

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration key - not found in spec: \"{0}\"")]
    NotInSpec(String),

    #[error("Missing configuration entry \"{0}\"")]
    MissingValue(String),

    #[error("Empty or invalid value supplied for configuration key \"{key}\": {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid or unreadable file, or content is not valid JSON: {path}: {reason}")]
    InvalidSourceFile { path: PathBuf, reason: String },

    #[error("Could not write configuration as JSON to: {path}")]
    CannotWriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", join_errors(.0))]
    Multiple(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn invalid(key: &str, value: &Value) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Resolves to the canonical directory path.
///
/// Values are strings, so a directory whose canonical path is not valid UTF-8 (reachable
/// through a UTF-8 symlink) is rejected as `InvalidValue` even though it exists.
fn existing_directory(key: &str, value: Value) -> Result<Value, ConfigError> {
    let Some(raw) = value.as_str().filter(|s| Path::new(s).is_dir()) else {
        return Err(invalid(key, &value));
    };
    let canonical = fs::canonicalize(raw).map_err(|_| invalid(key, &value))?;
    match canonical.to_str() {
        Some(s) => Ok(Value::String(s.to_string())),
        None => Err(invalid(key, &value)),
    }
}

fn size_threshold(key: &str, value: Value) -> Result<Value, ConfigError> {
    match value.as_str() {
        Some(s) if SIZE_THRESHOLD_PATTERN.is_match(s) => Ok(value),
        _ => Err(invalid(key, &value)),
    }
}

fn non_empty(key: &str, value: Value) -> Result<Value, ConfigError> {
    match value.as_str() {
        Some(s) if !s.is_empty() => Ok(value),
        _ => Err(invalid(key, &value)),
    }
}

/// The option set recognised by the uploader.
pub fn builtin_specs() -> Vec<ValueSpec> {
    vec![
        ValueSpec::new(PATH, SpecType::String)
            .with_filter(existing_directory)
            .transient(),
        ValueSpec::new(SIZE_THRESHOLD, SpecType::String).with_filter(size_threshold),
        ValueSpec::new(DELETE, SpecType::Boolean).with_default(false),
        ValueSpec::new(LIMIT, SpecType::Integer).with_default(0_i64),
        ValueSpec::new(SKIP_UP_TO_DATE, SpecType::Boolean).with_default(false),
        ValueSpec::new(S3_REGION, SpecType::String).with_filter(non_empty),
        ValueSpec::new(S3_BUCKET, SpecType::String).with_filter(non_empty),
        ValueSpec::new(S3_KEY, SpecType::String)
            .with_filter(non_empty)
            .transient(),
        ValueSpec::new(S3_SECRET, SpecType::String)
            .with_filter(non_empty)
            .transient(),
    ]
}

/// Keyed store of raw values, validated against a fixed spec table on read.
#[derive(Debug, Clone)]
pub struct Config {
    specs: Vec<ValueSpec>,
    values: HashMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::with_specs(builtin_specs())
    }

    pub fn with_specs(specs: Vec<ValueSpec>) -> Self {
        Self {
            specs,
            values: HashMap::new(),
        }
    }

    fn spec(&self, key: &str) -> Result<&ValueSpec, ConfigError> {
        self.specs
            .iter()
            .find(|spec| spec.key() == key)
            .ok_or_else(|| ConfigError::NotInSpec(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stores a raw value. Validation happens when the key is read.
    pub fn set(
        &mut self,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<&mut Self, ConfigError> {
        self.spec(key)?;
        self.values.insert(key.to_string(), value.into());
        Ok(self)
    }

    /// Resolves a key: stored values are coerced and filtered, defaults are returned verbatim.
    pub fn get(&self, key: &str) -> Result<Value, ConfigError> {
        let spec = self.spec(key)?;
        match self.values.get(key) {
            Some(raw) => spec.resolve(raw),
            None => spec
                .default()
                .cloned()
                .ok_or_else(|| ConfigError::MissingValue(key.to_string())),
        }
    }

    /// Copies every spec key present (and non-null) in `source`. Later merges override earlier ones.
    pub fn merge(&mut self, source: &Map<String, serde_json::Value>) -> &mut Self {
        for spec in &self.specs {
            match source.get(spec.key()) {
                Some(value) if !value.is_null() => {
                    self.values.insert(spec.key().to_string(), value.clone());
                }
                _ => {}
            }
        }
        self
    }

    pub fn merge_json_file(&mut self, path: &Path) -> Result<&mut Self, ConfigError> {
        let invalid_file = |reason: String| ConfigError::InvalidSourceFile {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| invalid_file(e.to_string()))?;
        let parsed: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| invalid_file(e.to_string()))?;
        let serde_json::Value::Object(data) = parsed else {
            return Err(invalid_file("top-level value is not an object".to_string()));
        };

        debug!(config_path = %path.display(), keys = data.len(), "Merging configuration file");
        Ok(self.merge(&data))
    }

    /// Snapshot of the serializable keys that hold a stored, non-default value.
    pub fn serialize(&self) -> Result<BTreeMap<String, Value>, ConfigError> {
        let mut snapshot = BTreeMap::new();
        for spec in self.specs.iter().filter(|s| s.is_serializable()) {
            if !self.has(spec.key()) {
                continue;
            }
            let resolved = self.get(spec.key())?;
            if spec.default() == Some(&resolved) {
                continue;
            }
            snapshot.insert(spec.key().to_string(), resolved);
        }
        Ok(snapshot)
    }

    pub fn write_json(&self, path: &Path) -> Result<&Self, ConfigError> {
        let cannot_write = |source: std::io::Error| ConfigError::CannotWriteFile {
            path: path.to_path_buf(),
            source,
        };

        let snapshot = self.serialize()?;
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| cannot_write(std::io::Error::other(e)))?;
        fs::write(path, content).map_err(cannot_write)?;
        Ok(self)
    }

    /// Resolves every spec key once and produces the immutable settings used by a run.
    ///
    /// Each key fails independently; all failures are reported together.
    pub fn validate(&self) -> Result<UploadSettings, ConfigError> {
        let mut resolved = HashMap::new();
        let mut errors = Vec::new();
        for spec in &self.specs {
            match self.get(spec.key()) {
                Ok(value) => {
                    resolved.insert(spec.key(), value);
                }
                Err(e) => errors.push(e),
            }
        }

        if errors.len() == 1 {
            return Err(errors.remove(0));
        }
        if !errors.is_empty() {
            return Err(ConfigError::Multiple(errors));
        }

        let resolved = Resolved(resolved);
        let limit = resolved.integer(LIMIT)?;
        Ok(UploadSettings {
            path: PathBuf::from(resolved.string(PATH)?),
            size_threshold: resolved.string(SIZE_THRESHOLD)?,
            delete: resolved.boolean(DELETE)?,
            limit: usize::try_from(limit).ok().filter(|n| *n > 0),
            skip_up_to_date: resolved.boolean(SKIP_UP_TO_DATE)?,
            s3: S3Config {
                region: resolved.string(S3_REGION)?,
                bucket_name: resolved.string(S3_BUCKET)?,
                access_key_id: resolved.string(S3_KEY)?,
                secret_access_key: resolved.string(S3_SECRET)?,
            },
        })
    }
}

struct Resolved(HashMap<&'static str, Value>);

impl Resolved {
    fn value(&self, key: &str) -> Result<&Value, ConfigError> {
        self.0
            .get(key)
            .ok_or_else(|| ConfigError::NotInSpec(key.to_string()))
    }

    fn string(&self, key: &str) -> Result<String, ConfigError> {
        let value = self.value(key)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| invalid(key, value))
    }

    fn boolean(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.value(key)?;
        value.as_bool().ok_or_else(|| invalid(key, value))
    }

    fn integer(&self, key: &str) -> Result<i64, ConfigError> {
        let value = self.value(key)?;
        value.as_i64().ok_or_else(|| invalid(key, value))
    }
}

#[derive(Clone)]
pub struct S3Config {
    pub region: String,
    pub bucket_name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Validated configuration for a single upload run.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Canonical scan root.
    pub path: PathBuf,
    /// Threshold as written by the user; units are interpreted by the scanner.
    pub size_threshold: String,
    pub delete: bool,
    /// `None` means unbounded.
    pub limit: Option<usize>,
    pub skip_up_to_date: bool,
    pub s3: S3Config,
}
