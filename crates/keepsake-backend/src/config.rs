use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// Where [`FileBackend`](crate::FileBackend) keeps save files.
///
/// A slot named `slot` lives at `<root>/<directory>/<slot>.<extension>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Base directory, typically the application's data directory.
    pub root: PathBuf,
    /// Sub-directory holding the save files. Created on first save.
    pub directory: String,
    /// File extension, without the dot.
    pub extension: String,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            directory: "saves".into(),
            extension: "data".into(),
        }
    }
}

impl FileBackendConfig {
    /// Default layout under the given root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// The directory holding save files.
    pub fn save_dir(&self) -> PathBuf {
        self.root.join(&self.directory)
    }

    /// The file path for a slot. Does not validate the slot name.
    pub fn path_for(&self, slot: &str) -> PathBuf {
        self.save_dir().join(format!("{slot}.{}", self.extension))
    }

    /// Parse from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> BackendResult<Self> {
        toml::from_str(s).map_err(|e| BackendError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: &Path) -> BackendResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
