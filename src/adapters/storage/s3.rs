use crate::adapters::storage::{ImageStore, ImageUpload};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageStore {
    #[must_use]
    pub const fn new(client: Client, bucket: String, public_base_url: String) -> Self {
        Self { client, bucket, public_base_url }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    #[tracing::instrument(
        level = "debug",
        skip(self, image),
        fields(image_key = tracing::field::Empty, image_size = image.bytes.len())
    )]
    async fn put_image(&self, image: ImageUpload) -> Result<String> {
        let key = format!("images/{}.{}", Uuid::new_v4(), image.extension());
        tracing::Span::current().record("image_key", key.as_str());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(image.content_type)
            .body(ByteStream::from(image.bytes))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload image: {e:?}")))?;

        Ok(format!("{}/{key}", self.public_base_url))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_image(&self, url: &str) -> Result<()> {
        let Some(key) = url.strip_prefix(self.public_base_url.as_str()).and_then(|rest| rest.strip_prefix('/')) else {
            tracing::warn!("Image URL does not belong to this bucket");
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete image: {e:?}")))?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Bucket {} unreachable: {e:?}", self.bucket)))?;
        Ok(())
    }
}
