//! Index open configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{IndexError, IndexResult};
use crate::storage::{OpenMode, StorageError, DEFAULT_FILE_RESERVE};

/// Smallest node size accepted by [`IndexConfig::validate`].
pub const MIN_NODE_SIZE: u32 = 64;

/// Everything needed to open an index against its two files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Path of the position-tree file
    pub index_path: PathBuf,

    /// Path of the flat file holding the records
    pub file_path: PathBuf,

    /// How both files are opened (default: read_only)
    #[serde(default)]
    pub mode: OpenMode,

    /// Creation signature checked against an existing index file
    /// (default: u64::MAX)
    #[serde(default = "default_signature")]
    pub signature: u64,

    /// Node size in bytes for a newly created index (default: 4096)
    #[serde(default = "default_node_size")]
    pub node_size: u32,

    /// Flat-file mapping segment size in bytes (default: 1 MiB)
    #[serde(default = "default_file_reserve")]
    pub file_reserve: u64,
}

fn default_signature() -> u64 {
    u64::MAX
}

fn default_node_size() -> u32 {
    4096
}

fn default_file_reserve() -> u64 {
    DEFAULT_FILE_RESERVE
}

impl IndexConfig {
    /// Creates a read-only configuration for the given files.
    pub fn new(index_path: impl Into<PathBuf>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            file_path: file_path.into(),
            mode: OpenMode::default(),
            signature: default_signature(),
            node_size: default_node_size(),
            file_reserve: default_file_reserve(),
        }
    }

    /// Places `<name>.idx` and `<name>.dat` in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join(format!("{}.idx", name)),
            dir.join(format!("{}.dat", name)),
        )
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn signature(mut self, signature: u64) -> Self {
        self.signature = signature;
        self
    }

    pub fn node_size(mut self, node_size: u32) -> Self {
        self.node_size = node_size;
        self
    }

    pub fn file_reserve(mut self, file_reserve: u64) -> Self {
        self.file_reserve = file_reserve;
        self
    }

    /// Checks the values a new index would be created with.
    pub fn validate(&self) -> IndexResult<()> {
        if self.node_size < MIN_NODE_SIZE || !self.node_size.is_power_of_two() {
            return Err(IndexError::InvalidConfig(format!(
                "node_size must be a power of two of at least {}, got {}",
                MIN_NODE_SIZE, self.node_size
            )));
        }
        if self.index_path.as_os_str().is_empty() || self.file_path.as_os_str().is_empty() {
            return Err(IndexError::InvalidConfig(
                "index_path and file_path must be set".to_string(),
            ));
        }
        if self.index_path == self.file_path {
            return Err(IndexError::InvalidConfig(
                "index_path and file_path must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads and validates a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            StorageError::io(format!("failed to read config {}", path.display()), e)
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            IndexError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }
}
