// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Flat-file handoff store for uploads and detection outputs
//!
//! The store is a directory pair: the service writes uploads and output
//! artifacts here, and the output file server reads them back by name.
//! Filenames are identity: a second upload with the same stem silently
//! overwrites the previous artifacts (last-write-wins, no versioning).
//!
//! Client-supplied names are reduced to their final path component
//! before use, so `../../etc/passwd` style names resolve inside the
//! store directories.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::vision::DetectionDocument;

/// Custom error types for the file store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize detections: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Directory pair used as the upload/output handoff medium
#[derive(Debug, Clone)]
pub struct FileStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl FileStore {
    /// Create a store, creating both directories if needed
    pub fn new<P: Into<PathBuf>>(upload_dir: P, output_dir: P) -> Result<Self, StorageError> {
        let upload_dir = upload_dir.into();
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&upload_dir)?;
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            upload_dir,
            output_dir,
        })
    }

    /// Uploads directory path
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Outputs directory path
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reduce a client-supplied name to a safe final path component
    ///
    /// Rejects names that have no usable component (empty, `.`, `..`,
    /// trailing separator).
    pub fn sanitize_file_name(name: &str) -> Result<String, StorageError> {
        let candidate = Path::new(name)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .last()
            .ok_or_else(|| StorageError::InvalidFileName(name.to_string()))?;

        if candidate.is_empty() {
            return Err(StorageError::InvalidFileName(name.to_string()));
        }
        Ok(candidate.to_string())
    }

    /// Filename without its extension, used to derive sibling output names
    pub fn stem(file_name: &str) -> String {
        Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string()
    }

    /// Persist raw upload bytes under the sanitized client filename
    ///
    /// Returns the name actually used. An existing file with the same
    /// name is overwritten.
    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let name = Self::sanitize_file_name(file_name)?;
        let path = self.upload_dir.join(&name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Saved upload to {}", path.display());
        Ok(name)
    }

    /// Write the detection document as pretty-printed JSON
    ///
    /// Returns the derived `<stem>.json` filename.
    pub async fn write_detection_json(
        &self,
        stem: &str,
        document: &DetectionDocument,
    ) -> Result<String, StorageError> {
        let name = format!("{}.json", stem);
        let json = to_pretty_json(document)?;
        tokio::fs::write(self.output_dir.join(&name), json).await?;
        Ok(name)
    }

    /// Write the annotated JPEG bytes
    ///
    /// Returns the derived `<stem>_annotated.jpg` filename.
    pub async fn write_annotated_jpeg(
        &self,
        stem: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let name = format!("{}_annotated.jpg", stem);
        tokio::fs::write(self.output_dir.join(&name), bytes).await?;
        Ok(name)
    }

    /// Read an output file by name
    ///
    /// Returns `Ok(None)` when the file does not exist or the name
    /// sanitizes to nothing.
    pub async fn read_output(&self, file_name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let name = match Self::sanitize_file_name(file_name) {
            Ok(name) => name,
            Err(_) => return Ok(None),
        };
        match tokio::fs::read(self.output_dir.join(&name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Content type for an output file, guessed from its extension
    pub fn content_type_for(file_name: &str) -> &'static str {
        match Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("json") => "application/json",
            _ => "application/octet-stream",
        }
    }
}

/// Pretty-print with the same layout the original artifacts used
fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
