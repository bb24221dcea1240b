use crate::adapters::storage::{ImageStore, ImageUpload};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Keeps uploaded images in memory and hands out `memory://` references.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    objects: DashMap<String, ImageUpload>,
}

impl MemoryImageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<ImageUpload> {
        self.objects.get(url).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put_image(&self, image: ImageUpload) -> Result<String> {
        let url = format!("memory://images/{}.{}", Uuid::new_v4(), image.extension());
        self.objects.insert(url.clone(), image);
        Ok(url)
    }

    async fn delete_image(&self, url: &str) -> Result<()> {
        self.objects.remove(url);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
