use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SessionStoreError;

/// File-backed store for the current session identifier.
///
/// The file is absent (or empty) when no session exists. `save` replaces the
/// file via a same-directory temporary and an atomic rename.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted identifier. A missing or empty file is `None`,
    /// never an error.
    pub fn load(&self) -> Result<Option<String>, SessionStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionStoreError::io("reading session file", &self.path, source));
            }
        };

        let id = contents.trim();
        if id.is_empty() {
            Ok(None)
        } else {
            Ok(Some(id.to_string()))
        }
    }

    /// Atomically replaces the persisted identifier.
    pub fn save(&self, id: &str) -> Result<(), SessionStoreError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SessionStoreError::EmptyIdentifier {
                path: self.path.clone(),
            });
        }

        let parent = self
            .path
            .parent()
            .ok_or_else(|| SessionStoreError::NoParentDirectory {
                path: self.path.clone(),
            })?;
        fs::create_dir_all(parent)
            .map_err(|source| SessionStoreError::io("creating session directory", parent, source))?;

        // Write-then-rename keeps concurrent readers on a complete value.
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, id)
            .map_err(|source| SessionStoreError::io("staging session file", &staging, source))?;
        fs::rename(&staging, &self.path)
            .map_err(|source| SessionStoreError::io("replacing session file", &self.path, source))?;

        Ok(())
    }

    /// Removes the persisted identifier. A missing file is success.
    pub fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionStoreError::io(
                "removing session file",
                &self.path,
                source,
            )),
        }
    }
}
