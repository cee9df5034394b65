//! File-based storage implementation.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;
use uuid::Uuid;

use crate::error::{Result, VersionError};
use crate::storage::{Storage, StorageError, check_name};

const TEMP_SUFFIX: &str = ".tmp";

/// Configuration for file-based storage.
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Root directory of the storage.
    pub path: PathBuf,

    /// fsync files and the directory on every store.
    pub sync_writes: bool,

    /// Create the root directory if it is missing.
    pub create_dirs: bool,
}

impl FileStorageConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileStorageConfig {
            path: path.as_ref().to_path_buf(),
            sync_writes: true,
            create_dirs: true,
        }
    }
}

/// A directory-rooted storage implementation.
///
/// Stores write a uniquely named temporary file and rename it over the
/// target, so a crashed writer leaves at most a stray temporary file.
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
    config: FileStorageConfig,
}

impl FileStorage {
    pub fn new(config: FileStorageConfig) -> Result<Self> {
        let directory = config.path.clone();

        if !directory.exists() {
            if !config.create_dirs {
                return Err(StorageError::FileNotFound(directory.display().to_string()).into());
            }
            fs::create_dir_all(&directory)
                .map_err(|e| VersionError::storage(format!("Failed to create directory: {e}")))?;
        }

        if !directory.is_dir() {
            return Err(VersionError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory, config })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    fn sync_directory(&self) -> Result<()> {
        // Directories cannot be opened for fsync on every platform.
        #[cfg(unix)]
        {
            File::open(&self.directory)
                .and_then(|dir| dir.sync_all())
                .map_err(io_error)?;
        }
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> VersionError {
    match e.kind() {
        ErrorKind::PermissionDenied => StorageError::PermissionDenied(e.to_string()).into(),
        _ => StorageError::IoError(e.to_string()).into(),
    }
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

impl Storage for FileStorage {
    fn load_may_non_exist(&self, name: &str) -> Result<Option<Vec<u8>>> {
        check_name(name)?;
        match fs::read(self.file_path(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    fn store(&self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;

        let temp_name = format!(".{name}.{}{TEMP_SUFFIX}", Uuid::new_v4().simple());
        let temp_path = self.file_path(&temp_name);

        let write_result = (|| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(data)?;
            if self.config.sync_writes {
                file.sync_all()?;
            }
            Ok(())
        })();

        if let Err(e) = write_result.and_then(|_| fs::rename(&temp_path, self.file_path(name))) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error(e));
        }

        if self.config.sync_writes {
            self.sync_directory()?;
        }
        debug!("stored {} bytes to {}", data.len(), self.file_path(name).display());
        Ok(())
    }

    fn file_exists(&self, name: &str) -> bool {
        check_name(name).is_ok() && self.file_path(name).is_file()
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.directory).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let path = entry.path();

            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if !is_temp_file(name) {
                        files.push(name.to_string());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        check_name(name)?;
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(FileStorageConfig::new(temp_dir.path())).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_store_and_load() {
        let (_temp_dir, storage) = create_test_storage();

        assert_eq!(storage.load_may_non_exist("version.0").unwrap(), None);
        storage.store("version.0", b"Hello, World!").unwrap();
        assert_eq!(
            storage.load_may_non_exist("version.0").unwrap().unwrap(),
            b"Hello, World!"
        );

        storage.store("version.0", b"second").unwrap();
        assert_eq!(
            storage.load_may_non_exist("version.0").unwrap().unwrap(),
            b"second"
        );
    }

    #[test]
    fn test_list_skips_temp_files() {
        let (temp_dir, storage) = create_test_storage();
        storage.store("version.1", b"a").unwrap();
        storage.store("version.3", b"b").unwrap();
        fs::write(temp_dir.path().join(".version.5.abc.tmp"), b"partial").unwrap();
        fs::create_dir(temp_dir.path().join("segment_0")).unwrap();

        assert_eq!(storage.list_files().unwrap(), vec!["version.1", "version.3"]);
    }

    #[test]
    fn test_delete_file() {
        let (_temp_dir, storage) = create_test_storage();
        storage.store("version.1", b"a").unwrap();
        assert!(storage.file_exists("version.1"));

        storage.delete_file("version.1").unwrap();
        storage.delete_file("version.1").unwrap();
        assert!(!storage.file_exists("version.1"));
    }

    #[test]
    fn test_missing_directory_without_create() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = FileStorageConfig::new(temp_dir.path().join("missing"));
        config.create_dirs = false;
        assert!(FileStorage::new(config).is_err());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let (_temp_dir, storage) = create_test_storage();
        assert!(storage.store("../escape", b"x").is_err());
        assert!(storage.load_may_non_exist("a/b").is_err());
        assert!(!storage.file_exists(".."));
    }
}
