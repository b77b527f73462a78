//! Where a chunk came from.

use chrono::{DateTime, Utc};
use docindex_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::Metadata;

/// Origin of an ingested document, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source_kind", rename_all = "snake_case")]
pub enum ChunkSource {
    /// A file picked up from disk
    File {
        /// Path of the file
        path: PathBuf,
        /// Modification time when it was read
        modified: Option<DateTime<Utc>>,
    },
    /// A document uploaded by a caller
    Upload {
        /// Bare file name, no directory components
        filename: String,
        /// Uploader, when known
        uploaded_by: Option<String>,
    },
    /// A row copied from a database table
    DatabaseSync {
        /// Table name
        table: String,
        /// Primary key of the row
        row_id: String,
    },
}

impl ChunkSource {
    /// File source
    ///
    /// # Errors
    /// Returns [`Error::InvalidSource`] if the path is empty
    pub fn file(path: impl Into<PathBuf>, modified: Option<DateTime<Utc>>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidSource("file path is empty".to_owned()));
        }
        Ok(Self::File { path, modified })
    }

    /// Upload source
    ///
    /// # Errors
    /// Returns [`Error::InvalidSource`] if the file name is blank or contains a path separator
    pub fn upload(filename: impl Into<String>, uploaded_by: Option<String>) -> Result<Self> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(Error::InvalidSource("upload file name is empty".to_owned()));
        }
        if filename.contains(['/', '\\']) {
            return Err(Error::InvalidSource(format!(
                "upload file name '{filename}' contains a path separator"
            )));
        }
        Ok(Self::Upload {
            filename,
            uploaded_by,
        })
    }

    /// Database row source
    ///
    /// # Errors
    /// Returns [`Error::InvalidSource`] if the table or row id is blank
    pub fn database_sync(table: impl Into<String>, row_id: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let row_id = row_id.into();
        if table.trim().is_empty() || row_id.trim().is_empty() {
            return Err(Error::InvalidSource(
                "database sync source needs a table and a row id".to_owned(),
            ));
        }
        Ok(Self::DatabaseSync { table, row_id })
    }

    /// Stable kind tag stored under the `source_kind` metadata key
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Upload { .. } => "upload",
            Self::DatabaseSync { .. } => "database_sync",
        }
    }

    /// Human-readable origin stored under the `source` metadata key
    pub fn label(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Upload { filename, .. } => filename.clone(),
            Self::DatabaseSync { table, row_id } => format!("{table}:{row_id}"),
        }
    }

    /// Metadata entries describing this source
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_owned(), Value::from(self.label()));
        metadata.insert("source_kind".to_owned(), Value::from(self.kind()));

        match self {
            Self::File { path, modified } => {
                if let Some(name) = path.file_name() {
                    metadata.insert(
                        "filename".to_owned(),
                        Value::from(name.to_string_lossy().into_owned()),
                    );
                }
                if let Some(extension) = extension_of(path) {
                    metadata.insert("extension".to_owned(), Value::from(extension));
                }
                if let Some(modified) = modified {
                    metadata.insert(
                        "last_modified".to_owned(),
                        Value::from(modified.to_rfc3339()),
                    );
                }
            }
            Self::Upload {
                filename,
                uploaded_by,
            } => {
                metadata.insert("filename".to_owned(), Value::from(filename.as_str()));
                if let Some(uploader) = uploaded_by {
                    metadata.insert("uploaded_by".to_owned(), Value::from(uploader.as_str()));
                }
            }
            Self::DatabaseSync { table, row_id } => {
                metadata.insert("table".to_owned(), Value::from(table.as_str()));
                metadata.insert("row_id".to_owned(), Value::from(row_id.as_str()));
            }
        }

        metadata
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|extension| format!(".{}", extension.to_string_lossy().to_lowercase()))
}
