//! Amazon S3 backend

use super::ObjectStorage;
use crate::error::{LakeError, Result};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;

const SERVICE: &str = "S3";

pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

/// S3 rejects an explicit `us-east-1` location constraint; every other
/// region must be named.
pub(crate) fn location_constraint(region: &str) -> Option<&str> {
    match region {
        "us-east-1" => None,
        other => Some(other),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(name);
        if let Some(constraint) = location_constraint(region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(constraint))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let conflict = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false);
                if conflict {
                    Err(LakeError::already_exists(format!("bucket {}", name)))
                } else {
                    Err(LakeError::provider(SERVICE, DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: String) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/x-ndjson")
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|err| LakeError::provider(SERVICE, DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }
}
