use super::ObjectStorage;
use crate::error::{LakeError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Bucket {
    region: String,
    objects: BTreeMap<String, String>,
}

/// In-process object storage. Clones share the same buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket_exists(&self, name: &str) -> bool {
        self.buckets.lock().unwrap().contains_key(name)
    }

    pub fn bucket_region(&self, name: &str) -> Option<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(name)
            .map(|b| b.region.clone())
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    /// Bodies of every object whose key starts with `prefix`, in key order
    pub fn objects_under(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|b| {
                b.objects
                    .iter()
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(_, body)| body.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn create_bucket(&self, name: &str, region: &str) -> Result<()> {
        let mut buckets = self.buckets.lock().unwrap();
        if buckets.contains_key(name) {
            return Err(LakeError::already_exists(format!("bucket {}", name)));
        }
        buckets.insert(
            name.to_string(),
            Bucket {
                region: region.to_string(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: String) -> Result<()> {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket_entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| LakeError::provider("S3", format!("NoSuchBucket: {}", bucket)))?;
        bucket_entry.objects.insert(key.to_string(), body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_into_missing_bucket_fails() {
        let storage = MemoryStorage::new();
        let err = storage
            .put_object("nowhere", "k", String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LakeError::Provider { service: "S3", .. }));
    }

    #[tokio::test]
    async fn test_objects_under_prefix() {
        let storage = MemoryStorage::new();
        storage.create_bucket("lake", "eu-west-1").await.unwrap();
        storage.put_object("lake", "raw-data/a", "a".into()).await.unwrap();
        storage.put_object("lake", "raw-data/b", "b".into()).await.unwrap();
        storage.put_object("lake", "athena-results/x", "x".into()).await.unwrap();

        assert_eq!(storage.objects_under("lake", "raw-data/"), vec!["a", "b"]);
        assert_eq!(storage.bucket_region("lake").as_deref(), Some("eu-west-1"));
    }
}
