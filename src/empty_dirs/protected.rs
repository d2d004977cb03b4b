use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::error::RegistryError;
use super::paths::normalize;

/// Folders the user excluded from deletion, keyed by normalized absolute path,
/// so relative or `..` spellings of a folder all hit the same entry. The key
/// string is opaque to the core beyond splitting on `|`.
#[derive(Debug, Clone, Default)]
pub struct ProtectedFolderRegistry {
    entries: HashMap<PathBuf, String>,
}

impl ProtectedFolderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// First registration wins; later adds for the same path are ignored.
    pub fn add(&mut self, path: impl Into<PathBuf>, key: impl Into<String>) {
        let path = normalize(&path.into());
        self.entries.entry(path).or_insert_with(|| key.into());
    }

    pub fn remove(&mut self, path: &Path) {
        self.entries.remove(&normalize(path));
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(&normalize(path))
    }

    pub fn key_parts(&self, path: &Path) -> Result<Vec<String>, RegistryError> {
        self.entries
            .get(&normalize(path))
            .map(|key| key.split('|').map(str::to_string).collect())
            .ok_or_else(|| RegistryError::NotFound(path.to_path_buf()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
