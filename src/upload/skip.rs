// s3-offload/src/upload/skip.rs
use super::scanner::FileCandidate;
use super::store::ObjectStore;
use crate::errors::{AppError, Result};

/// Decides whether a candidate already has an up-to-date remote copy.
///
/// A remote object counts as up to date when its byte length equals the local file's
/// size. Content is never compared, so a same-sized change goes unnoticed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipEvaluator {
    enabled: bool,
}

impl SkipEvaluator {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Makes no remote calls when disabled.
    pub async fn should_skip(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
        candidate: &FileCandidate,
    ) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }

        let key = candidate.relative_path.as_str();
        if !store.object_exists(bucket, key).await? {
            return Ok(false);
        }

        match store.head_object_length(bucket, key).await? {
            Some(length) if length >= 0 => Ok(length as u64 == candidate.size),
            Some(length) => Err(AppError::RemoteMetadata {
                key: key.to_string(),
                reason: format!("negative content length {}", length),
            }),
            None => Err(AppError::RemoteMetadata {
                key: key.to_string(),
                reason: "no content length".to_string(),
            }),
        }
    }
}
