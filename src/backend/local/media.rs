use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::common::GatewayError;
use crate::gateway::{MediaStorage, new_image_key};

/// Copies images into a media directory and hands out `file://` URLs.
pub struct LocalMedia {
    root: PathBuf,
}

impl LocalMedia {
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }
}

#[async_trait]
impl MediaStorage for LocalMedia {
    async fn upload(&self, local_path: &Path) -> Result<String, GatewayError> {
        let key = new_image_key();
        let target = self.root.join(&key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = tokio::fs::copy(local_path, &target).await?;
        log::debug!("Stored {} ({bytes} bytes) as {key}", local_path.display());

        Ok(format!("file://{}", target.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_copies_file_under_images_prefix() {
        let media_dir = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("cat.png");
        std::fs::write(&source, b"png bytes").unwrap();

        let media = LocalMedia::new(media_dir.path()).unwrap();
        let url = media.upload(&source).await.unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.contains("/images/"));
        let stored = url.trim_start_matches("file://");
        assert_eq!(std::fs::read(stored).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn missing_source_propagates_io_error() {
        let media_dir = tempfile::tempdir().unwrap();
        let media = LocalMedia::new(media_dir.path()).unwrap();
        let result = media.upload(Path::new("/definitely/not/here.png")).await;
        assert!(matches!(result, Err(GatewayError::Io(_))));
    }
}
