use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};
use url::Url;

use super::{deletion_key, ObjectStore, StorageError};
use crate::common::object_path;
use crate::config::settings::StorageConfig;

#[derive(Clone)]
pub struct StorageService {
    client: Client,
    bucket: String,
    endpoint: String,
    host_marker: String,
}

impl StorageService {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = object_path::normalize_endpoint(&config.endpoint);
        Url::parse(&endpoint).map_err(|e| StorageError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let credentials = Credentials::new(
            config.access_key.as_str(),
            config.secret_key.as_str(),
            None,
            None,
            "static",
        );

        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(endpoint.as_str())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        info!("✅ Object store client ready for {}/{}", endpoint, config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            endpoint,
            host_marker: config.host_marker.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, StorageError> {
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::Request(format!("Failed to upload {}: {}", key, aws_sdk_s3::Error::from(e))))?;

        let url = self.public_url(key);
        debug!(key, size, content_type, "Uploaded object");
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = deletion_key(url, &self.bucket, &self.host_marker)? else {
            debug!(url, "Skipping placeholder object");
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::Request(format!("Failed to delete {}: {}", key, aws_sdk_s3::Error::from(e))))?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        object_path::public_url(&self.endpoint, &self.bucket, key)
    }

    fn host_marker(&self) -> &str {
        &self.host_marker
    }
}
