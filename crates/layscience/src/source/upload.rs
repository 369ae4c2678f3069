//! Local storage for user-uploaded PDFs.

use std::path::{Path, PathBuf};

use crate::error::{ResolveError, UploadError};
use crate::job::UploadId;

/// Every PDF starts with this header.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Default upload limit (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Saves uploaded PDFs as `<dir>/<file_id>.pdf`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn path_for(&self, id: &UploadId) -> PathBuf {
        self.dir.join(format!("{}.pdf", id))
    }

    /// Validates and stores an upload, returning its new id.
    ///
    /// The file is written under a temporary name and renamed into place so
    /// a concurrent job never reads a partial upload.
    pub async fn save(&self, bytes: &[u8]) -> Result<UploadId, UploadError> {
        if bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(UploadError::UnsupportedFormat);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| UploadError::Io {
                path: self.dir.clone(),
                source: e,
            })?;

        let id = UploadId::generate();
        let path = self.path_for(&id);
        let partial = path.with_extension("pdf.part");

        tokio::fs::write(&partial, bytes)
            .await
            .map_err(|e| UploadError::Io {
                path: partial.clone(),
                source: e,
            })?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| UploadError::Io {
                path: path.clone(),
                source: e,
            })?;

        log::info!("Stored upload {} ({} bytes)", id, bytes.len());
        Ok(id)
    }

    /// Reads a stored upload.
    pub async fn load(&self, id: &UploadId) -> Result<Vec<u8>, ResolveError> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::NotFound(format!("upload {}", id)))
            }
            Err(e) => Err(ResolveError::Fetch {
                message: format!("failed to read upload {}: {}", id, e),
                status: None,
                transient: false,
                retry_after: None,
            }),
        }
    }
}
