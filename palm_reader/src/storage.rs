use crate::config::StorageConfig;
use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes uploads and annotated images under timestamped names.
#[derive(Debug, Clone)]
pub struct ImageStore {
    upload_dir: PathBuf,
    image_dir: PathBuf,
}

impl ImageStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        for dir in [&config.upload_dir, &config.image_dir] {
            std::fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            upload_dir: config.upload_dir.clone(),
            image_dir: config.image_dir.clone(),
        })
    }

    pub async fn save_upload(&self, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self
            .upload_dir
            .join(format!("hand_upload_{}.jpg", timestamp()));
        write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn save_annotated(&self, jpg: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.image_dir.join(format!("hand_{}.jpg", timestamp()));
        write(&path, jpg).await?;
        Ok(path)
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}

async fn write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_saves_files_under_configured_dirs() {
        let root = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            upload_dir: root.path().join("uploads"),
            image_dir: root.path().join("images"),
        };
        let store = ImageStore::new(&config).unwrap();

        let upload = store.save_upload(b"raw").await.unwrap();
        let annotated = store.save_annotated(b"jpg").await.unwrap();

        assert!(upload.starts_with(&config.upload_dir));
        assert!(annotated.starts_with(&config.image_dir));
        let name = annotated.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("hand_") && name.ends_with(".jpg"));
        assert_eq!(std::fs::read(&upload).unwrap(), b"raw");
    }
}
