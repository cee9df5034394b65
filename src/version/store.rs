//! Persistence of versions on top of a [`Storage`].

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use crate::error::{Result, VersionError};
use crate::storage::Storage;
use crate::version::VersionId;
use crate::version::codec;
use crate::version::config::VersionConfig;
use crate::version::descriptor::Version;
use crate::version::task::IndexTaskLog;

/// Reads and writes version documents named `<prefix>.<id>`.
#[derive(Debug, Clone)]
pub struct VersionStore {
    storage: Arc<dyn Storage>,
    config: VersionConfig,
}

impl VersionStore {
    pub fn new(storage: Arc<dyn Storage>, config: VersionConfig) -> Result<Self> {
        config.validate()?;
        Ok(VersionStore { storage, config })
    }

    pub fn config(&self) -> &VersionConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn version_file_name(&self, version_id: VersionId) -> String {
        format!("{}.{version_id}", self.config.file_prefix)
    }

    /// Version id encoded in a file name, if it is a version file.
    pub fn parse_version_file_name(&self, name: &str) -> Option<VersionId> {
        let id = name
            .strip_prefix(self.config.file_prefix.as_str())?
            .strip_prefix('.')?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        id.parse().ok()
    }

    /// Ids of all version files, ascending.
    pub fn list_version_ids(&self) -> Result<Vec<VersionId>> {
        let mut ids: Vec<VersionId> = self
            .storage
            .list_files()?
            .iter()
            .filter_map(|name| self.parse_version_file_name(name))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Raw document text of a version, or `None` if it does not exist.
    pub fn load_text(&self, version_id: VersionId) -> Result<Option<String>> {
        let name = self.version_file_name(version_id);
        let Some(bytes) = self.storage.load_may_non_exist(&name)? else {
            return Ok(None);
        };
        String::from_utf8(bytes).map(Some).map_err(|e| {
            VersionError::decode(
                Some(version_id),
                format!("{name} is not UTF-8: {e}"),
                String::from_utf8_lossy(e.as_bytes()),
            )
        })
    }

    /// Load a version, or `None` if it does not exist.
    pub fn load(&self, version_id: VersionId) -> Result<Option<Version>> {
        let Some(text) = self.load_text(version_id)? else {
            return Ok(None);
        };
        let version = codec::decode(&text).map_err(|e| match e {
            VersionError::Decode {
                version_id: None,
                reason,
                content,
            } => VersionError::Decode {
                version_id: Some(version_id),
                reason,
                content,
            },
            other => other,
        })?;
        if version.version_id() != version_id {
            return Err(VersionError::decode(
                Some(version_id),
                format!(
                    "file {} holds version {}",
                    self.version_file_name(version_id),
                    version.version_id()
                ),
                text,
            ));
        }
        Ok(Some(version))
    }

    /// Load a version that must exist.
    pub fn load_required(&self, version_id: VersionId) -> Result<Version> {
        self.load(version_id)?.ok_or_else(|| {
            VersionError::not_found(self.version_file_name(version_id))
        })
    }

    /// Newest version that decodes.
    ///
    /// Corrupt documents are skipped in favor of the next older version when
    /// `fallback_on_corruption` is set; otherwise the error is returned.
    pub fn load_latest(&self) -> Result<Option<Version>> {
        for version_id in self.list_version_ids()?.into_iter().rev() {
            match self.load(version_id) {
                Ok(Some(version)) => return Ok(Some(version)),
                Ok(None) => continue,
                Err(e) if e.is_corruption() && self.config.fallback_on_corruption => {
                    warn!("skipping corrupt version [{version_id}]: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Persist a sealed version.
    pub fn store(&self, version: &Version) -> Result<()> {
        if !version.is_valid() {
            return Err(VersionError::invalid_operation(
                "cannot store a version without a version id",
            ));
        }
        if !version.is_sealed() {
            return Err(VersionError::invalid_operation(format!(
                "version {} is not sealed",
                version.version_id()
            )));
        }
        if !version.is_finalized() {
            return Err(VersionError::invalid_operation(format!(
                "version {} is not finalized",
                version.version_id()
            )));
        }
        let text = codec::encode(version, &self.config.host_identity())?;
        self.storage
            .store(&self.version_file_name(version.version_id()), text.as_bytes())
    }

    /// Stamp the commit time, finalize, seal and persist a version.
    pub fn commit(&self, version: &mut Version) -> Result<()> {
        if !version.validate() {
            return Err(VersionError::invalid_operation(format!(
                "version {} has unordered segments",
                version.version_id()
            )));
        }
        version.set_commit_time(Utc::now().timestamp_micros());
        version.finalize();
        version.seal();
        self.store(version)?;
        info!(
            "committed {version} with version line {}",
            version.version_line()
        );
        Ok(())
    }

    /// Record a completed task in a version's history, bounded per type.
    pub fn record_task_log<S: Into<String>>(
        &self,
        version: &mut Version,
        task_type: S,
        log: IndexTaskLog,
    ) {
        version
            .task_history_mut()
            .add_log(task_type, log, self.config.max_task_history_per_type);
    }

    pub fn delete(&self, version_id: VersionId) -> Result<()> {
        self.storage.delete_file(&self.version_file_name(version_id))
    }
}
