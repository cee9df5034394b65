//! Configuration for version persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VersionError};
use crate::version::VERSION_FILE_PREFIX;
use crate::version::task::DEFAULT_MAX_LOGS_PER_TYPE;

/// Settings shared by the codec and the version store.
///
/// # Example
///
/// ```
/// use index_version::version::VersionConfig;
///
/// let mut config = VersionConfig::default();
/// config.hostname = Some("builder-01".to_string());
/// assert_eq!(config.file_prefix, "version");
/// assert_eq!(config.host_identity(), "builder-01");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionConfig {
    /// Prefix of version file names.
    pub file_prefix: String,

    /// Host identity written into documents.
    ///
    /// When unset, the `HOSTNAME` environment variable is used.
    pub hostname: Option<String>,

    /// Skip corrupt documents when looking for the latest version.
    ///
    /// A corrupt file then blocks only its own version id and the next
    /// older durable version is served instead.
    pub fallback_on_corruption: bool,

    /// Task logs kept per task type in a version's history.
    pub max_task_history_per_type: usize,
}

impl Default for VersionConfig {
    fn default() -> Self {
        VersionConfig {
            file_prefix: VERSION_FILE_PREFIX.to_string(),
            hostname: None,
            fallback_on_corruption: true,
            max_task_history_per_type: DEFAULT_MAX_LOGS_PER_TYPE,
        }
    }
}

impl VersionConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: VersionConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_prefix.is_empty() || self.file_prefix.contains('.') {
            return Err(VersionError::invalid_argument(format!(
                "file prefix must be non-empty and contain no '.': {:?}",
                self.file_prefix
            )));
        }
        if self.max_task_history_per_type == 0 {
            return Err(VersionError::invalid_argument(
                "max_task_history_per_type must be positive",
            ));
        }
        Ok(())
    }

    /// Host identity to record in encoded documents.
    pub fn host_identity(&self) -> String {
        self.hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = VersionConfig::default();
        assert_eq!(config.file_prefix, "version");
        assert!(config.hostname.is_none());
        assert!(config.fallback_on_corruption);
        assert_eq!(config.max_task_history_per_type, DEFAULT_MAX_LOGS_PER_TYPE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"hostname": "host-a", "fallback_on_corruption": false}}"#).unwrap();

        let config = VersionConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.host_identity(), "host-a");
        assert!(!config.fallback_on_corruption);
        assert_eq!(config.file_prefix, "version");
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let config = VersionConfig {
            file_prefix: "ver.sion".to_string(),
            ..VersionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
