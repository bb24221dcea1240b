use crate::error::{AppError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub mod memory;
pub mod s3;

pub use memory::MemoryImageStore;
pub use s3::S3ImageStore;

/// A decoded image ready to be handed to object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Parses a `data:image/<kind>;base64,<payload>` URL as sent by clients.
    /// A bare base64 string is accepted as an untyped image.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the payload is not a base64 image.
    pub fn from_data_url(payload: &str) -> Result<Self> {
        let (content_type, encoded) = match payload.strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) =
                    rest.split_once(',').ok_or_else(|| AppError::BadRequest("Malformed image data URL".into()))?;
                let content_type = meta
                    .strip_suffix(";base64")
                    .ok_or_else(|| AppError::BadRequest("Image data URL must be base64 encoded".into()))?;
                if !content_type.starts_with("image/") {
                    return Err(AppError::BadRequest(format!("Unsupported content type: {content_type}")));
                }
                (content_type.to_string(), data)
            }
            None => ("application/octet-stream".to_string(), payload),
        };

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::BadRequest(format!("Invalid image encoding: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Image is empty".into()));
        }

        Ok(Self { content_type, bytes })
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// Object storage for message images.
#[async_trait]
pub trait ImageStore: Send + Sync + std::fmt::Debug {
    /// Stores the image and returns a stable URL referencing it.
    async fn put_image(&self, image: ImageUpload) -> Result<String>;

    /// Removes an image previously returned by `put_image`. Unknown URLs are ignored.
    async fn delete_image(&self, url: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_png_data_url() {
        let upload = ImageUpload::from_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.extension(), "png");
        assert_eq!(&upload.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_accepts_bare_base64() {
        let upload = ImageUpload::from_data_url("aGVsbG8=").unwrap();
        assert_eq!(upload.bytes, b"hello");
        assert_eq!(upload.extension(), "bin");
    }

    #[test]
    fn test_rejects_non_image_content_type() {
        let res = ImageUpload::from_data_url("data:text/plain;base64,aGVsbG8=");
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_rejects_invalid_base64() {
        let res = ImageUpload::from_data_url("data:image/png;base64,***");
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_rejects_empty_payload() {
        let res = ImageUpload::from_data_url("data:image/png;base64,");
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }
}
