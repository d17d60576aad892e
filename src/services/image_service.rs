use chrono::{DateTime, Datelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Claims;
use crate::db::repository::ImageRepository;
use crate::library::{StorageAdapter, Thumb};
use crate::models::{now, Image};
use crate::services::Page;
use crate::{AppError, Result};

/// Pre-rendered sizes; `r` is the width-limited copy shown in content.
pub const IMAGE_THUMBS: [Thumb; 1] = [Thumb::new("r", 1080, 0)];

const MAX_FILENAME_CHARS: usize = 255;

static IMAGE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9a-f]{32}\.(?:png|jpg|gif|webp)").expect("valid image key regex"));

pub struct ImageService {
    repo: Arc<dyn ImageRepository>,
    storage: Arc<dyn StorageAdapter>,
    max_upload_bytes: usize,
}

impl ImageService {
    pub fn new(repo: Arc<dyn ImageRepository>, storage: Arc<dyn StorageAdapter>, max_upload_bytes: usize) -> Self {
        Self {
            repo,
            storage,
            max_upload_bytes,
        }
    }

    /// Storage path, partitioned by upload day: `2024/05/01/<key>`.
    pub fn path(key: &str, create_time: i64) -> String {
        match DateTime::from_timestamp(create_time, 0) {
            Some(date) => format!("{:04}/{:02}/{:02}/{}", date.year(), date.month(), date.day(), key),
            None => key.to_string(),
        }
    }

    pub fn get_urls(&self, key: &str, create_time: i64) -> BTreeMap<String, String> {
        self.storage.get(&Self::path(key, create_time), &IMAGE_THUMBS)
    }

    pub async fn upload(&self, user_id: i64, filename: &str, data: Vec<u8>) -> Result<Image> {
        if data.is_empty() {
            return Err(AppError::field("image", "Please select an image to upload"));
        }
        if data.len() > self.max_upload_bytes {
            return Err(AppError::field(
                "image",
                &format!("Image must be at most {} bytes", self.max_upload_bytes),
            ));
        }

        let extension = match image::guess_format(&data) {
            Ok(image::ImageFormat::Png) => "png",
            Ok(image::ImageFormat::Jpeg) => "jpg",
            Ok(image::ImageFormat::Gif) => "gif",
            Ok(image::ImageFormat::WebP) => "webp",
            _ => return Err(AppError::field("image", "Only png, jpg, gif and webp images are supported")),
        };

        let (data, width, height) = tokio::task::spawn_blocking(move || {
            let decoded = image::load_from_memory(&data)
                .map_err(|e| AppError::field("image", &format!("Unreadable image: {}", e)))?;
            Ok::<_, AppError>((data, decoded.width(), decoded.height()))
        })
        .await
        .map_err(|e| AppError::InternalError(format!("Image decode task failed: {}", e)))??;

        let image = Image {
            key: format!("{}.{}", Uuid::new_v4().simple(), extension),
            filename: clean_filename(filename),
            width: width as i32,
            height: height as i32,
            create_time: now(),
            item_type: None,
            item_id: 0,
            user_id,
        };

        self.storage
            .write(&Self::path(&image.key, image.create_time), &data, &IMAGE_THUMBS)
            .await?;
        let image = self.repo.insert(&image).await?;

        tracing::info!("User {} uploaded image {} ({}x{})", user_id, image.key, width, height);
        Ok(image)
    }

    pub async fn get(&self, key: &str) -> Result<Image> {
        self.repo
            .find(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", key)))
    }

    pub async fn find_many(&self, keys: &[String]) -> Result<Vec<Image>> {
        self.repo.find_many(keys).await
    }

    pub async fn list(&self, user_id: Option<i64>, limit: u32, offset: u32) -> Result<Page<Image>> {
        let items = self.repo.list(user_id, limit, offset).await?;
        let total = self.repo.count(user_id).await?;
        Ok(Page { items, total })
    }

    pub async fn update(&self, viewer: &Claims, key: &str, filename: Option<String>) -> Result<Image> {
        let mut image = self.get(key).await?;
        check_owner(viewer, &image)?;

        if let Some(filename) = filename {
            let filename = filename.trim();
            if filename.is_empty() {
                return Err(AppError::field("filename", "must not be empty"));
            }
            if filename.chars().count() > MAX_FILENAME_CHARS {
                return Err(AppError::field("filename", "is too long"));
            }
            image.filename = filename.to_string();
        }

        self.repo.update(&image).await
    }

    pub async fn delete(&self, viewer: &Claims, key: &str) -> Result<()> {
        let image = self.get(key).await?;
        check_owner(viewer, &image)?;
        self.remove(&[image]).await
    }

    /// Deletes the given images the viewer may delete; others are skipped.
    pub async fn delete_multiple(&self, viewer: &Claims, keys: &[String]) -> Result<()> {
        let images: Vec<Image> = self
            .repo
            .find_many(keys)
            .await?
            .into_iter()
            .filter(|image| check_owner(viewer, image).is_ok())
            .collect();
        self.remove(&images).await
    }

    async fn remove(&self, images: &[Image]) -> Result<()> {
        if images.is_empty() {
            return Ok(());
        }
        for image in images {
            self.storage
                .delete(&Self::path(&image.key, image.create_time), &IMAGE_THUMBS)
                .await?;
        }
        let keys: Vec<String> = images.iter().map(|image| image.key.clone()).collect();
        self.repo.delete(&keys).await?;
        tracing::info!("Deleted {} images", keys.len());
        Ok(())
    }

    /// Links images referenced in `markdown` to the content item.
    pub async fn attach_from_content(&self, markdown: &str, user_id: i64, item_type: &str, item_id: i64) -> Result<()> {
        let keys = image_keys(markdown);
        if keys.is_empty() {
            return Ok(());
        }
        self.repo.attach(&keys, user_id, item_type, item_id).await
    }
}

fn check_owner(viewer: &Claims, image: &Image) -> Result<()> {
    if viewer.user_id != image.user_id && !viewer.is_admin {
        return Err(AppError::Forbidden("You can only modify your own images".to_string()));
    }
    Ok(())
}

fn clean_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let name: String = name.chars().take(MAX_FILENAME_CHARS).collect();
    if name.is_empty() {
        "image".to_string()
    } else {
        name
    }
}

/// Image keys appearing in content, in first-seen order.
pub fn image_keys(content: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for found in IMAGE_KEY_RE.find_iter(content) {
        if !keys.iter().any(|key| key == found.as_str()) {
            keys.push(found.as_str().to_string());
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_date_partitioned() {
        // 2024-05-01 12:00:00 UTC
        assert_eq!(ImageService::path("abc.png", 1_714_564_800), "2024/05/01/abc.png");
    }

    #[test]
    fn test_image_keys_deduplicates() {
        let key = "0123456789abcdef0123456789abcdef.png";
        let content = format!("![a](/upload/2024/05/01/{key}) and again {key} and nothing.jpg");
        assert_eq!(image_keys(&content), vec![key.to_string()]);
    }

    #[test]
    fn test_clean_filename() {
        assert_eq!(clean_filename("C:\\photos\\cat.png"), "cat.png");
        assert_eq!(clean_filename("../../etc/passwd"), "passwd");
        assert_eq!(clean_filename(""), "image");
    }
}
