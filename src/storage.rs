//! Storage abstraction for version documents.
//!
//! Version documents are small, whole-file blobs that are written once and
//! replaced atomically, so the storage facade works on complete byte
//! buffers. File and memory backends can be swapped without touching the
//! version store.
//!
//! # Example
//!
//! ```
//! use index_version::storage::{StorageConfig, StorageFactory};
//! use index_version::storage::memory::MemoryStorageConfig;
//!
//! # fn main() -> index_version::error::Result<()> {
//! let storage = StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default()))?;
//! storage.store("version.1", b"{}")?;
//! assert_eq!(storage.load_may_non_exist("version.1")?, Some(b"{}".to_vec()));
//! assert_eq!(storage.load_may_non_exist("version.3")?, None);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::error::{Result, VersionError};

pub mod file;
pub mod memory;

/// A durable key/value blob store.
///
/// Implementations never retry internally; every failure is reported to
/// the caller.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Read a whole file, or `None` if it does not exist.
    fn load_may_non_exist(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Write a whole file, atomically replacing any previous content.
    ///
    /// Readers observe either the old content or the new content, never a
    /// partial write.
    fn store(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// List all file names, sorted.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Delete a file. Deleting a missing file succeeds.
    fn delete_file(&self, name: &str) -> Result<()>;
}

/// Configuration for storage backends.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    File(file::FileStorageConfig),

    Memory(memory::MemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(memory::MemoryStorageConfig::default())
    }
}

/// A factory for creating storage instances.
pub struct StorageFactory;

impl StorageFactory {
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::Memory(mem_config) => {
                let storage = memory::MemoryStorage::new(mem_config);
                Ok(Arc::new(storage))
            }
            StorageConfig::File(file_config) => {
                let storage = file::FileStorage::new(file_config)?;
                Ok(Arc::new(storage))
            }
        }
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    FileNotFound(String),

    PermissionDenied(String),

    IoError(String),

    InvalidName(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::PermissionDenied(name) => write!(f, "Permission denied: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::InvalidName(name) => write!(f, "Invalid file name: {name:?}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for VersionError {
    fn from(err: StorageError) -> Self {
        VersionError::storage(err.to_string())
    }
}

/// Reject names that would escape the storage root.
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(StorageError::InvalidName(name.to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::FileStorageConfig;
    use crate::storage::memory::MemoryStorageConfig;

    #[test]
    fn test_storage_config_default() {
        match StorageConfig::default() {
            StorageConfig::Memory(mem_config) => {
                assert_eq!(mem_config.initial_capacity, 16);
            }
            _ => panic!("Expected Memory config"),
        }
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("version.1".to_string());
        assert_eq!(err.to_string(), "File not found: version.1");

        let err = StorageError::IoError("disk full".to_string());
        assert_eq!(err.to_string(), "I/O error: disk full");

        let err: VersionError = StorageError::InvalidName("../x".to_string()).into();
        assert_eq!(err.to_string(), "Storage error: Invalid file name: \"../x\"");
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("version.3").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("..").is_err());
        assert!(check_name("a/b").is_err());
    }

    #[test]
    fn test_storage_factory_memory() {
        let storage = StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default()))
            .unwrap();
        assert!(!storage.file_exists("version.0"));
    }

    #[test]
    fn test_storage_factory_file() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::File(FileStorageConfig::new(temp_dir.path()));
        let storage = StorageFactory::create(config).unwrap();

        storage.store("version.1", b"data").unwrap();
        assert!(temp_dir.path().join("version.1").exists());
    }
}
