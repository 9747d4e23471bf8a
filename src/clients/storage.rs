use async_trait::async_trait;
use aws_sdk_s3::{
    Client as S3Client,
    config::{BehaviorVersion, Builder as S3ConfigBuilder, Credentials, Region},
    primitives::ByteStream,
};
use uuid::Uuid;

use super::{ClientError, ClientResult};

const IMAGE_PREFIX: &str = "ITEM_IMAGES";

/// Object key of an item image.
pub fn image_key(id: Uuid, format: &str) -> String {
    format!("{IMAGE_PREFIX}/{id}.{format}")
}

/// Public URL of an object under `public_base`.
pub fn public_object_url(public_base: &str, key: &str) -> String {
    format!("{}/{}", public_base.trim_end_matches('/'), key)
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> ClientResult<()>;

    fn public_url(&self, key: &str) -> String;

    fn image_url(&self, id: Uuid, format: &str) -> String {
        self.public_url(&image_key(id, format))
    }
}

/// S3-compatible bucket (Cloudflare R2) with a public read domain.
pub struct R2Store {
    client: S3Client,
    bucket: String,
    public_base: String,
}

impl R2Store {
    pub fn new(
        endpoint: &str,
        bucket: impl Into<String>,
        access_key_id: &str,
        secret_access_key: &str,
        public_base: impl Into<String>,
    ) -> Self {
        let credentials = Credentials::new(access_key_id, secret_access_key, None, None, "r2");
        let config = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self {
            client: S3Client::from_conf(config),
            bucket: bucket.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for R2Store {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> ClientResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "object upload failed");
                ClientError::Storage(e.to_string())
            })?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(&self.public_base, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_urls_are_templated_under_the_public_base() {
        let id = Uuid::nil();
        let key = image_key(id, "jpg");
        assert_eq!(key, format!("ITEM_IMAGES/{id}.jpg"));
        assert_eq!(
            public_object_url("https://cdn.example.com/", &key),
            format!("https://cdn.example.com/ITEM_IMAGES/{id}.jpg")
        );
    }
}
