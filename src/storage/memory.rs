//! In-memory storage implementation for testing and caching.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::{Storage, check_name};

/// Configuration for memory-based storage.
#[derive(Debug, Clone)]
pub struct MemoryStorageConfig {
    /// Initial capacity of the file table.
    pub initial_capacity: usize,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        MemoryStorageConfig {
            initial_capacity: 16,
        }
    }
}

/// An in-memory storage implementation.
///
/// Clones share the same file table, which lets tests hand one storage to
/// several stores and observe each other's writes.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Box<[u8]>>>>,
}

impl MemoryStorage {
    pub fn new(config: MemoryStorageConfig) -> Self {
        MemoryStorage {
            files: Arc::new(Mutex::new(HashMap::with_capacity(config.initial_capacity))),
        }
    }

    pub fn new_default() -> Self {
        Self::new(MemoryStorageConfig::default())
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Get the total size of all files.
    pub fn total_size(&self) -> u64 {
        self.files
            .lock()
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }
}

impl Storage for MemoryStorage {
    fn load_may_non_exist(&self, name: &str) -> Result<Option<Vec<u8>>> {
        check_name(name)?;
        Ok(self.files.lock().get(name).map(|data| data.to_vec()))
    }

    fn store(&self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;
        self.files
            .lock()
            .insert(name.to_string(), data.to_vec().into_boxed_slice());
        Ok(())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }
}
