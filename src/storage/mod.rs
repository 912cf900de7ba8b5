//! Object Storage - bucket provisioning and payload upload
//!
//! `ObjectStorage` is the seam between the pipeline and the storage provider:
//! - `S3Storage` talks to Amazon S3
//! - `MemoryStorage` keeps buckets and objects in process (tests, local runs)

pub mod memory;
pub mod s3;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

use crate::error::Result;
use crate::provision::{reclassify_conflict, Provisioned};
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create a bucket. Returns `LakeError::AlreadyExists` on conflict.
    async fn create_bucket(&self, name: &str, region: &str) -> Result<()>;

    /// Write `body` as a single object at `key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: String) -> Result<()>;
}

/// Make sure the bucket exists; an existing bucket is not an error.
pub async fn ensure_bucket(
    storage: &dyn ObjectStorage,
    name: &str,
    region: &str,
) -> Result<Provisioned> {
    let outcome = reclassify_conflict(storage.create_bucket(name, region).await)?;
    match outcome {
        Provisioned::Created => info!("Bucket {} created successfully.", name),
        Provisioned::AlreadyExisted => info!("Bucket {} already exists, continuing.", name),
    }
    Ok(outcome)
}

/// Write the serialized payload under `key`
pub async fn upload_payload(
    storage: &dyn ObjectStorage,
    bucket: &str,
    key: &str,
    payload: String,
) -> Result<()> {
    let bytes = payload.len();
    storage.put_object(bucket, key, payload).await?;
    info!("Uploaded data to s3://{}/{} ({} bytes)", bucket, key, bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_bucket_is_idempotent() {
        let storage = MemoryStorage::new();

        let first = ensure_bucket(&storage, "demo-lake", "ap-southeast-2").await.unwrap();
        let second = ensure_bucket(&storage, "demo-lake", "ap-southeast-2").await.unwrap();

        assert_eq!(first, Provisioned::Created);
        assert_eq!(second, Provisioned::AlreadyExisted);
    }

    #[tokio::test]
    async fn test_upload_overwrites_existing_object() {
        let storage = MemoryStorage::new();
        ensure_bucket(&storage, "demo-lake", "us-east-1").await.unwrap();

        upload_payload(&storage, "demo-lake", "raw-data/a.jsonl", "{\"a\":1}".to_string())
            .await
            .unwrap();
        upload_payload(&storage, "demo-lake", "raw-data/a.jsonl", "{\"a\":2}".to_string())
            .await
            .unwrap();

        assert_eq!(
            storage.get_object("demo-lake", "raw-data/a.jsonl").as_deref(),
            Some("{\"a\":2}")
        );
    }
}
