// s3-offload/src/upload/store.rs
//! Remote object storage capability used by the upload pipeline.
//!
//! Any backend offering these three calls can stand in for S3, including test doubles.

use async_trait::async_trait;
use std::path::Path;

use crate::errors::StorageError;

/// Canned visibility applied to uploaded objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    Private,
    PublicRead,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Streams the file at `source` to `bucket/key` and returns the object's URL.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        acl: ObjectAcl,
    ) -> Result<String, StorageError>;

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Byte length reported by the store, if it reported one.
    async fn head_object_length(&self, bucket: &str, key: &str)
    -> Result<Option<i64>, StorageError>;
}
