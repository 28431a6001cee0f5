//! On-disk board persistence.
//!
//! Each board is a document file plus a JSON metadata file:
//! - `{content_dir}/{key}.html`
//! - `{content_dir}/{key}.json`
//!
//! Files are written to a temp name and renamed into place, document first and
//! metadata last. The metadata file is what makes a board exist: deleting it
//! first retires the pair, and on reload a document without matching metadata
//! is discarded.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::board::key;
use crate::board::{Board, BoardMeta};
use crate::error::BoardError;

const DOCUMENT_EXT: &str = "html";
const META_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metadata encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Hex SHA-256 of a document.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

#[derive(Debug, Clone)]
pub struct BoardStore {
    root: PathBuf,
}

impl BoardStore {
    /// Open (creating if needed) the content directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, DOCUMENT_EXT))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, META_EXT))
    }

    /// Persist a board, replacing any previous version.
    pub fn write_board(&self, key: &str, body: &[u8], meta: &BoardMeta) -> Result<(), StoreError> {
        let meta_json = serde_json::to_vec_pretty(meta)?;
        write_atomic(&self.document_path(key), body)?;
        write_atomic(&self.meta_path(key), &meta_json)?;

        tracing::debug!("Stored board {} ({} bytes)", key, body.len());
        Ok(())
    }

    /// Remove a board's files. A board that is already gone is not an error.
    pub fn delete_board(&self, key: &str) -> Result<(), StoreError> {
        remove_if_present(&self.meta_path(key))?;

        // The board is retired once its metadata is gone; a stray document is
        // swept up by the next `load_all`.
        if let Err(e) = remove_if_present(&self.document_path(key)) {
            tracing::warn!("Failed to remove document for retired board {}: {}", key, e);
        }
        Ok(())
    }

    /// Read one board back from disk. `Ok(None)` if it is not stored.
    pub fn read_board(&self, key: &str) -> Result<Option<Board>, StoreError> {
        let meta_bytes = match fs::read(self.meta_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: BoardMeta = serde_json::from_slice(&meta_bytes)?;

        let body = match fs::read(self.document_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if body_digest(&body) != meta.body_sha256 {
            return Ok(None);
        }

        Ok(Some(Board::new(Bytes::from(body), meta)))
    }

    /// Load every intact board and clean up leftovers from interrupted writes.
    pub fn load_all(&self) -> Result<Vec<(String, Board)>, StoreError> {
        let mut boards = Vec::new();
        let mut orphans = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };

            match ext {
                TEMP_EXT => orphans.push(path.clone()),
                META_EXT if key::is_well_formed(stem) => match self.read_board(stem) {
                    Ok(Some(board)) => boards.push((stem.to_string(), board)),
                    Ok(None) => {
                        tracing::warn!("Discarding torn board {}", stem);
                        orphans.push(path.clone());
                        orphans.push(self.document_path(stem));
                    }
                    Err(StoreError::Json(e)) => {
                        tracing::warn!("Discarding board {} with unreadable metadata: {}", stem, e);
                        orphans.push(path.clone());
                        orphans.push(self.document_path(stem));
                    }
                    Err(e) => return Err(e),
                },
                DOCUMENT_EXT if key::is_well_formed(stem) => {
                    if !self.meta_path(stem).exists() {
                        tracing::warn!("Discarding document without metadata {}", stem);
                        orphans.push(path.clone());
                    }
                }
                _ => {}
            }
        }

        for path in orphans {
            if let Err(e) = remove_if_present(&path) {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }

        Ok(boards)
    }
}

/// Run a storage operation on the blocking pool, bounded by `timeout`.
///
/// A timed-out operation keeps running to completion in the background. Callers
/// move the key's guard into `op` together with the matching index update, so
/// the key stays locked and the index follows the disk once it lands.
pub async fn run_blocking<T, F>(timeout: Duration, op: F) -> Result<T, BoardError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(op)).await {
        Ok(Ok(result)) => result.map_err(BoardError::from),
        Ok(Err(e)) => Err(BoardError::Storage(format!("Task join error: {}", e))),
        Err(_) => Err(BoardError::Storage(format!(
            "storage operation timed out after {:?}",
            timeout
        ))),
    }
}

/// Write to a unique temp file beside `path`, sync, then rename over `path`.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = path.with_file_name(format!(
        "{}.{}.{}",
        file_name,
        uuid::Uuid::now_v7().simple(),
        TEMP_EXT
    ));

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
