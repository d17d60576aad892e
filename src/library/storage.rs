use async_trait::async_trait;
use image::imageops::FilterType;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{AppError, Result};

/// Name of the untouched original in url maps.
pub const ORIGINAL: &str = "o";

/// A thumbnail size. A zero side means "scale to the other side, keep the
/// ratio"; two non-zero sides mean crop to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thumb {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl Thumb {
    pub const fn new(name: &'static str, width: u32, height: u32) -> Self {
        Self { name, width, height }
    }
}

/// File storage. The original file is always kept; back ends without
/// on-the-fly image processing render the thumbs when writing.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Public urls of the original and each thumb, keyed by name.
    fn get(&self, path: &str, thumbs: &[Thumb]) -> BTreeMap<String, String>;
    async fn write(&self, path: &str, data: &[u8], thumbs: &[Thumb]) -> Result<()>;
    async fn delete(&self, path: &str, thumbs: &[Thumb]) -> Result<()>;
}

/// `2024/05/01/abc.png` + `r` -> `2024/05/01/abc_r.png`
pub fn thumb_path(path: &str, name: &str) -> String {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => format!("{}_{}{}", &path[..dot], name, &path[dot..]),
        _ => format!("{}_{}", path, name),
    }
}

/// Stores files below a local directory served at `url_prefix`.
pub struct LocalStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn render_thumbs(original: &Path, targets: Vec<(PathBuf, Thumb)>) -> Result<()> {
        let img = image::open(original)
            .map_err(|e| AppError::ValidationError(format!("Unsupported image: {}", e)))?;

        for (target, thumb) in targets {
            let resized = match (thumb.width, thumb.height) {
                (0, 0) => img.clone(),
                (w, 0) if img.width() <= w => img.clone(),
                (0, h) if img.height() <= h => img.clone(),
                (w, 0) => img.resize(w, u32::MAX, FilterType::Lanczos3),
                (0, h) => img.resize(u32::MAX, h, FilterType::Lanczos3),
                (w, h) => img.resize_to_fill(w, h, FilterType::Lanczos3),
            };
            resized
                .save(&target)
                .map_err(|e| AppError::InternalError(format!("Failed to write thumbnail: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    fn get(&self, path: &str, thumbs: &[Thumb]) -> BTreeMap<String, String> {
        let mut urls = BTreeMap::new();
        urls.insert(ORIGINAL.to_string(), format!("{}/{}", self.url_prefix, path));
        for thumb in thumbs {
            urls.insert(
                thumb.name.to_string(),
                format!("{}/{}", self.url_prefix, thumb_path(path, thumb.name)),
            );
        }
        urls
    }

    async fn write(&self, path: &str, data: &[u8], thumbs: &[Thumb]) -> Result<()> {
        let original = self.full_path(path);
        if let Some(parent) = original.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::InternalError(format!("Failed to create storage directory: {}", e)))?;
        }
        tokio::fs::write(&original, data)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to write file: {}", e)))?;

        if thumbs.is_empty() {
            return Ok(());
        }

        let targets: Vec<(PathBuf, Thumb)> = thumbs
            .iter()
            .map(|thumb| (self.full_path(&thumb_path(path, thumb.name)), *thumb))
            .collect();
        tokio::task::spawn_blocking(move || Self::render_thumbs(&original, targets))
            .await
            .map_err(|e| AppError::InternalError(format!("Thumbnail task failed: {}", e)))??;

        tracing::debug!("Stored {} with {} thumbs", path, thumbs.len());
        Ok(())
    }

    async fn delete(&self, path: &str, thumbs: &[Thumb]) -> Result<()> {
        let mut paths = vec![self.full_path(path)];
        paths.extend(thumbs.iter().map(|thumb| self.full_path(&thumb_path(path, thumb.name))));

        for file in paths {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::InternalError(format!(
                        "Failed to delete {}: {}",
                        file.display(),
                        e
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_thumb_path() {
        assert_eq!(thumb_path("2024/05/01/abc.png", "r"), "2024/05/01/abc_r.png");
        assert_eq!(thumb_path("a.b/abc", "s"), "a.b/abc_s");
    }

    #[test]
    fn test_get_urls() {
        let storage = LocalStorage::new("/tmp/unused", "/upload/");
        let urls = storage.get("2024/05/01/abc.png", &[Thumb::new("r", 1080, 0)]);
        assert_eq!(urls["o"], "/upload/2024/05/01/abc.png");
        assert_eq!(urls["r"], "/upload/2024/05/01/abc_r.png");
    }

    #[tokio::test]
    async fn test_write_renders_thumbs_and_delete_removes_them() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/upload");
        let thumbs = [Thumb::new("s", 40, 20), Thumb::new("t", 50, 0)];

        storage.write("2024/05/01/abc.png", &png(200, 100), &thumbs).await.unwrap();

        let small = image::open(dir.path().join("2024/05/01/abc_s.png")).unwrap();
        assert_eq!((small.width(), small.height()), (40, 20));
        let scaled = image::open(dir.path().join("2024/05/01/abc_t.png")).unwrap();
        assert_eq!((scaled.width(), scaled.height()), (50, 25));

        storage.delete("2024/05/01/abc.png", &thumbs).await.unwrap();
        assert!(!dir.path().join("2024/05/01/abc.png").exists());
        assert!(!dir.path().join("2024/05/01/abc_s.png").exists());

        // already gone
        storage.delete("2024/05/01/abc.png", &thumbs).await.unwrap();
    }
}
