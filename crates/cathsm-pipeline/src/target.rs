//! Durable cache targets: the sole authority on whether a task's work has
//! already happened.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::TaskError;

/// A task output location on durable storage.
///
/// Writes go to a temp file in the destination directory and are renamed
/// into place, so a half-written crash never satisfies `exists()` for a
/// later run. Concurrent producers of the same path are safe without
/// locking: content is deterministic per identity, so the last rename wins
/// harmlessly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTarget {
    path: PathBuf,
}

impl CachedTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Result<Vec<u8>, TaskError> {
        fs::read(&self.path).map_err(|source| TaskError::CacheRead {
            path: self.path.clone(),
            source,
        })
    }

    pub fn write(&self, bytes: &[u8]) -> Result<(), TaskError> {
        let cache_write = |source: std::io::Error| TaskError::CacheWrite {
            path: self.path.clone(),
            source,
        };

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(cache_write)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(cache_write)?;
        tmp.write_all(bytes).map_err(cache_write)?;
        tmp.flush().map_err(cache_write)?;
        tmp.persist(&self.path).map_err(|e| cache_write(e.error))?;
        Ok(())
    }
}
