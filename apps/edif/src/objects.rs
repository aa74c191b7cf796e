//! # Object Storage
//!
//! A filesystem bucket for uploaded media. Objects live under a root
//! directory at bucket-relative paths and are served from
//! `{public_base_url}/files/{fullPath}`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use edif_core::files::{
    check_file_name, check_object_path, check_prefix, storage_object_name, unique_file_name,
};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Collection name used in `NotFound` errors for missing objects.
const OBJECTS: &str = "objects";

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub full_path: String,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

/// One file of a batch upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl ObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL of an object path, without checking it exists.
    pub fn url_for(&self, full_path: &str) -> String {
        format!("{}/files/{}", self.public_base_url, full_path)
    }

    fn resolve(&self, path: &str) -> AppResult<(String, PathBuf)> {
        let clean = check_object_path(path)?;
        Ok((clean.to_string(), self.root.join(clean)))
    }

    /// Store `bytes` at `{prefix}{epoch_millis}_{name}`.
    pub async fn upload(
        &self,
        prefix: &str,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> AppResult<UploadResult> {
        check_prefix(prefix)?;
        check_file_name(name)?;
        let full_path = storage_object_name(prefix, Utc::now().timestamp_millis(), name);
        self.write_object(&full_path, name, bytes, content_type).await
    }

    /// Like [`upload`](Self::upload) but adds a random segment, so two
    /// uploads of the same name in the same millisecond cannot collide.
    pub async fn upload_unique(
        &self,
        prefix: &str,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> AppResult<UploadResult> {
        check_prefix(prefix)?;
        check_file_name(name)?;
        let random = Uuid::new_v4().simple().to_string();
        let full_path = unique_file_name(
            name,
            prefix,
            Utc::now().timestamp_millis(),
            random.get(..8).unwrap_or(&random),
        );
        self.write_object(&full_path, name, bytes, content_type).await
    }

    async fn write_object(
        &self,
        full_path: &str,
        name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> AppResult<UploadResult> {
        let (full_path, target) = self.resolve(full_path)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, bytes).await?;
        info!(path = %full_path, size = bytes.len(), "object stored");

        Ok(UploadResult {
            download_url: self.url_for(&full_path),
            name: name.to_string(),
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
            full_path,
        })
    }

    /// Upload sequentially, reporting `(completed, total)` after each file.
    /// Stops at the first failure.
    pub async fn upload_many(
        &self,
        prefix: &str,
        files: &[UploadFile],
        mut progress: impl FnMut(usize, usize),
    ) -> AppResult<Vec<UploadResult>> {
        let total = files.len();
        let mut results = Vec::with_capacity(total);
        for (index, file) in files.iter().enumerate() {
            let result = self
                .upload(prefix, &file.name, &file.bytes, &file.content_type)
                .await?;
            results.push(result);
            progress(index + 1, total);
        }
        Ok(results)
    }

    /// Remove an object; `NotFound` when it does not exist.
    pub async fn delete(&self, path: &str) -> AppResult<()> {
        let (clean, target) = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                info!(path = %clean, "object deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::not_found(OBJECTS, &clean)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every listed object; all paths are attempted and the first
    /// failure is returned.
    pub async fn delete_many(&self, paths: &[String]) -> AppResult<()> {
        let mut first_error = None;
        for path in paths {
            if let Err(e) = self.delete(path).await {
                debug!(path = %path, error = %e, "batch delete failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Public URL of an existing object.
    pub async fn download_url(&self, path: &str) -> AppResult<String> {
        let (clean, target) = self.resolve(path)?;
        match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => Ok(self.url_for(&clean)),
            Ok(_) => Err(AppError::not_found(OBJECTS, &clean)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::not_found(OBJECTS, &clean)),
            Err(e) => Err(e.into()),
        }
    }

    /// Object contents, for serving.
    pub async fn read(&self, path: &str) -> AppResult<Vec<u8>> {
        let (clean, target) = self.resolve(path)?;
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
                Err(AppError::not_found(OBJECTS, &clean))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(dir: &tempfile::TempDir) -> ObjectStorage {
        ObjectStorage::new(dir.path(), "http://localhost:8080/")
    }

    #[tokio::test]
    async fn upload_names_object_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = bucket(&dir);

        let result = storage
            .upload("products/", "pill.png", b"png-bytes", "image/png")
            .await
            .unwrap();

        assert!(result.full_path.starts_with("products/"));
        assert!(result.full_path.ends_with("_pill.png"));
        assert_eq!(
            result.download_url,
            format!("http://localhost:8080/files/{}", result.full_path)
        );
        assert_eq!(result.size, 9);
        assert_eq!(storage.read(&result.full_path).await.unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn unique_uploads_of_one_name_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = bucket(&dir);

        let first = storage
            .upload_unique("docs/", "label.v2.pdf", b"1", "application/pdf")
            .await
            .unwrap();
        let second = storage
            .upload_unique("docs/", "label.v2.pdf", b"2", "application/pdf")
            .await
            .unwrap();

        assert_ne!(first.full_path, second.full_path);
        assert!(first.full_path.starts_with("docs/"));
        assert!(first.full_path.ends_with("_label.v2.pdf"));
        assert_eq!(first.name, "label.v2.pdf");
        assert_eq!(storage.read(&second.full_path).await.unwrap(), b"2");
    }

    #[tokio::test]
    async fn upload_many_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let storage = bucket(&dir);
        let files: Vec<UploadFile> = ["a.png", "b.png", "c.png"]
            .iter()
            .map(|name| UploadFile {
                name: (*name).to_string(),
                bytes: vec![1, 2, 3],
                content_type: "image/png".into(),
            })
            .collect();

        let mut seen = Vec::new();
        let results = storage
            .upload_many("gallery/", &files, |done, total| seen.push((done, total)))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn delete_and_download_url_report_missing_objects() {
        let dir = tempfile::tempdir().unwrap();
        let storage = bucket(&dir);
        let stored = storage.upload("", "doc.pdf", b"%PDF", "application/pdf").await.unwrap();

        assert!(storage.download_url(&stored.full_path).await.is_ok());
        storage.delete(&stored.full_path).await.unwrap();
        assert!(storage.download_url(&stored.full_path).await.unwrap_err().is_not_found());
        assert!(storage.delete(&stored.full_path).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_many_attempts_every_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = bucket(&dir);
        let a = storage.upload("", "a.txt", b"a", "text/plain").await.unwrap();
        let b = storage.upload("", "b.txt", b"b", "text/plain").await.unwrap();

        let paths = vec!["missing.txt".to_string(), a.full_path.clone(), b.full_path.clone()];
        assert!(storage.delete_many(&paths).await.is_err());
        assert!(storage.read(&a.full_path).await.unwrap_err().is_not_found());
        assert!(storage.read(&b.full_path).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = bucket(&dir);

        for path in ["../secret", "/etc/passwd", "a/../../b"] {
            let err = storage.read(path).await.unwrap_err();
            assert_eq!(err.status_code(), 400, "{path}");
        }
        assert!(storage.upload("../", "x.png", b"", "image/png").await.is_err());
        assert!(storage.upload("", "../x.png", b"", "image/png").await.is_err());
    }
}
