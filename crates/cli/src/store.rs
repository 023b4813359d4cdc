//! The file-metadata keystore: a single JSON document mapping file ids to
//! names and storage paths.
//!
//! The whole document is rewritten on every mutation; the store holds file
//! *metadata*, not clicks, so it changes at upload/delete frequency and a
//! full rewrite keeps the format trivially inspectable. The engine consumes
//! it read-only through [`ranking::NameLookup`] to resolve names on first
//! click.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata for one registered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Original (display) file name.
    #[serde(rename = "fileName")]
    pub name: String,
    /// Where the file contents live on disk.
    pub path: String,
}

/// An id → [`FileInfo`] map persisted as one JSON document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    files: BTreeMap<u64, FileInfo>,
}

impl FileStore {
    /// Loads the store from `path`; a missing file is an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let files = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .with_context(|| format!("invalid file store at {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read file store at {}", path.display()))
            }
        };
        Ok(Self { path, files })
    }

    /// Registers a file and returns its freshly allocated id.
    ///
    /// Ids are allocated as `max existing + 1`, so they grow while files
    /// are only added; the engine only requires uniqueness.
    pub fn add(&mut self, name: &str, file_path: &str) -> Result<u64> {
        let id = self.files.keys().next_back().map_or(1, |max| max + 1);
        self.files.insert(
            id,
            FileInfo {
                name: name.to_string(),
                path: file_path.to_string(),
            },
        );
        self.persist()?;
        Ok(id)
    }

    /// Drops a file's metadata. Returns whether the id was present.
    pub fn remove(&mut self, id: u64) -> Result<bool> {
        let removed = self.files.remove(&id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Looks up one file's metadata.
    pub fn get(&self, id: u64) -> Option<&FileInfo> {
        self.files.get(&id)
    }

    /// Iterates all entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &FileInfo)> {
        self.files.iter()
    }

    /// Number of registered files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Rewrites the JSON document.
    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_vec_pretty(&self.files)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("failed to write file store at {}", self.path.display()))
    }
}
