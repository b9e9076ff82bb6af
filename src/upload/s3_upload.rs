// s3-offload/src/upload/s3_upload.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::ObjectCannedAcl;
use std::path::Path;
use url::Url;

use super::store::{ObjectAcl, ObjectStore};
use crate::config::S3Config;
use crate::errors::StorageError;

impl From<ObjectAcl> for ObjectCannedAcl {
    fn from(acl: ObjectAcl) -> Self {
        match acl {
            ObjectAcl::Private => ObjectCannedAcl::Private,
            ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
        }
    }
}

/// Virtual-hosted-style URL of `key` in `bucket`, with each key segment percent-encoded.
pub fn object_url(region: &str, bucket: &str, key: &str) -> Result<String, StorageError> {
    let mut url = Url::parse(&format!("https://{}.s3.{}.amazonaws.com/", bucket, region))?;
    url.path_segments_mut()
        .map_err(|_| format!("Cannot build an object URL for bucket {}", bucket))?
        .pop_if_empty()
        .extend(key.split('/'));
    Ok(url.to_string())
}

/// Amazon S3 backend. One client is built per run and reused for every request.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: s3::Client,
    region: String,
}

impl S3Store {
    pub async fn connect(s3_config: &S3Config) -> Self {
        tracing::debug!(
            region = %s3_config.region,
            bucket = %s3_config.bucket_name,
            "Creating S3 client"
        );

        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(s3_config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &s3_config.access_key_id,
                &s3_config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ))
            .load()
            .await;

        Self {
            client: s3::Client::new(&sdk_config),
            region: s3_config.region.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        acl: ObjectAcl,
    ) -> Result<String, StorageError> {
        tracing::debug!(file = %source.display(), bucket, key, "Uploading object");

        let body = ByteStream::from_path(source).await.map_err(|e| {
            format!("Failed to create ByteStream from file {}: {}", source.display(), e)
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(acl.into())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                format!(
                    "Failed to upload file {} to S3 bucket {} with key {}: {}",
                    source.display(),
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                )
            })?;

        object_url(&self.region, bucket, key)
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(format!(
                "Failed to look up s3://{}/{}: {}",
                bucket,
                key,
                DisplayErrorContext(&err)
            )
            .into()),
        }
    }

    async fn head_object_length(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<i64>, StorageError> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                format!(
                    "Failed to read metadata of s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                )
            })?;
        Ok(head.content_length())
    }
}
