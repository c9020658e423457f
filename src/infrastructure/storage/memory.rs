//! In-memory object store for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use super::{deletion_key, ObjectStore, StorageError};
use crate::common::object_path;

pub const ENDPOINT: &str = "https://is3.example.com";
pub const BUCKET: &str = "bucket";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    deleted: Mutex<Vec<String>>,
    failing_puts: Mutex<u32>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` puts fail.
    pub fn fail_next_puts(&self, n: u32) {
        *self.failing_puts.lock().unwrap() = n;
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn insert(&self, key: &str, body: &[u8], content_type: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: Bytes::copy_from_slice(body),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError> {
        {
            let mut failing = self.failing_puts.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(StorageError::Request("connection reset".to_string()));
            }
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(key))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        if let Some(key) = deletion_key(url, BUCKET, self.host_marker())? {
            self.objects.lock().unwrap().remove(&key);
            self.deleted.lock().unwrap().push(key);
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        object_path::public_url(ENDPOINT, BUCKET, key)
    }

    fn host_marker(&self) -> &str {
        object_path::DEFAULT_HOST_MARKER
    }
}
