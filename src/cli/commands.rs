//! Command implementations for the index-version CLI.

use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{Result, VersionError};
use crate::storage::file::{FileStorage, FileStorageConfig};
use crate::version::{Version, VersionConfig, VersionStore};

/// Execute a CLI command.
pub fn execute_command(args: VersionArgs) -> Result<()> {
    match &args.command {
        Command::List(list_args) => list_versions(list_args.clone(), &args),
        Command::Show(show_args) => show_version(show_args.clone(), &args),
        Command::Validate(validate_args) => validate_versions(validate_args.clone(), &args),
        Command::FastForward(ff_args) => check_fast_forward(ff_args.clone(), &args),
    }
}

/// Open the version store of a partition directory.
fn open_store(directory: &Path, cli_args: &VersionArgs) -> Result<VersionStore> {
    let config = match &cli_args.config {
        Some(path) => {
            debug!("loading version config from {}", path.display());
            VersionConfig::from_json_file(path)?
        }
        None => VersionConfig::default(),
    };

    let mut storage_config = FileStorageConfig::new(directory);
    storage_config.create_dirs = false;
    let storage = FileStorage::new(storage_config)?;
    VersionStore::new(Arc::new(storage), config)
}

/// List all versions of a partition directory.
fn list_versions(args: ListArgs, cli_args: &VersionArgs) -> Result<()> {
    let store = open_store(&args.directory, cli_args)?;

    let mut versions = Vec::new();
    let mut corrupt = Vec::new();
    for version_id in store.list_version_ids()? {
        match store.load(version_id) {
            Ok(Some(version)) => versions.push(summarize(&version)),
            Ok(None) => continue,
            Err(e) if e.is_corruption() => {
                warn!("version [{version_id}] is corrupt: {e}");
                corrupt.push(version_id);
            }
            Err(e) => return Err(e),
        }
    }

    let result = VersionListResult {
        directory: args.directory.display().to_string(),
        versions,
        corrupt,
    };
    output_result("Versions", &result, cli_args)
}

/// Show one version, or the latest readable one.
fn show_version(args: ShowArgs, cli_args: &VersionArgs) -> Result<()> {
    let store = open_store(&args.directory, cli_args)?;

    let version = match args.version_id {
        Some(version_id) => store.load_required(version_id)?,
        None => store.load_latest()?.ok_or_else(|| {
            VersionError::not_found(format!(
                "no version in {}",
                args.directory.display()
            ))
        })?,
    };

    let result = VersionDetail {
        version_id: version.version_id(),
        format_version: version.format_version(),
        schema_id: version.schema_id(),
        read_schema_id: version.read_schema_id(),
        schema_version_roadmap: version.schema_version_roadmap().ids().to_vec(),
        segments: version.segments().to_vec(),
        last_segment_id: version.last_segment_id(),
        fence_name: version.fence_name().to_string(),
        sealed: version.is_sealed(),
        commit_time: version.commit_time(),
        locator: version.locator().to_string(),
        version_line: version.version_line().to_string(),
        description: version.description().clone(),
    };
    output_result(&format!("Version {}", version.version_id()), &result, cli_args)
}

/// Decode every version file and report problems.
///
/// Fails when at least one document cannot be decoded.
fn validate_versions(args: ValidateArgs, cli_args: &VersionArgs) -> Result<()> {
    let store = open_store(&args.directory, cli_args)?;

    let version_ids = store.list_version_ids()?;
    let mut corrupt = Vec::new();
    let mut warnings = Vec::new();
    for &version_id in &version_ids {
        match store.load(version_id) {
            Ok(Some(version)) => {
                warnings.extend(check_version(&version).into_iter().map(|issue| {
                    VersionIssue { version_id, issue }
                }));
            }
            Ok(None) => continue,
            Err(e) if e.is_corruption() => corrupt.push(VersionIssue {
                version_id,
                issue: e.to_string(),
            }),
            Err(e) => return Err(e),
        }
    }

    let corrupt_count = corrupt.len();
    let result = ValidationResult {
        directory: args.directory.display().to_string(),
        versions_checked: version_ids.len(),
        corrupt,
        warnings,
    };
    output_result("Validation", &result, cli_args)?;

    if corrupt_count > 0 {
        return Err(VersionError::invalid_operation(format!(
            "{corrupt_count} corrupt version document(s) in {}",
            args.directory.display()
        )));
    }
    Ok(())
}

/// Decide whether version `to` can fast-forward from version `from`.
fn check_fast_forward(args: FastForwardArgs, cli_args: &VersionArgs) -> Result<()> {
    let store = open_store(&args.directory, cli_args)?;

    let from = store.load_required(args.from)?;
    let to = store.load_required(args.to)?;
    let can_fast_forward = to.can_fast_forward_from(&from.coord(), args.building);

    let result = FastForwardResult {
        from: from.coord().to_string(),
        to: to.coord().to_string(),
        has_building_segment: args.building,
        can_fast_forward,
        version_line: to.version_line().to_string(),
    };
    output_result("Fast-forward check", &result, cli_args)
}

fn summarize(version: &Version) -> VersionSummary {
    VersionSummary {
        version_id: version.version_id(),
        schema_id: version.schema_id(),
        segment_count: version.segment_count(),
        last_segment_id: version.last_segment_id(),
        fence_name: version.fence_name().to_string(),
        sealed: version.is_sealed(),
        commit_time: version.commit_time(),
    }
}

/// Consistency problems of a decoded version that do not make it unreadable.
fn check_version(version: &Version) -> Vec<String> {
    let mut issues = Vec::new();

    if !version.is_sealed() {
        issues.push("version is not sealed".to_string());
    }
    if !version.validate() {
        issues.push("segments are not strictly ascending".to_string());
    }
    for segment in version.segments() {
        if !version.is_in_schema_version_roadmap(segment.schema_id) {
            issues.push(format!(
                "segment {} uses schema {} missing from the roadmap",
                segment.segment_id, segment.schema_id
            ));
        }
    }
    if version.is_public() && !version.fence_name().is_empty() {
        let head = version.version_line().head_version();
        if head.version_id != version.version_id() {
            issues.push(format!(
                "version line head {head} does not match the version"
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn args_for(dir: &Path, command: &str) -> VersionArgs {
        VersionArgs::try_parse_from([
            "index-version",
            "--quiet",
            "--format",
            "json",
            command,
            dir.to_str().unwrap(),
        ])
        .unwrap()
    }

    fn commit_versions(dir: &Path) -> VersionStore {
        let storage = FileStorage::new(FileStorageConfig::new(dir)).unwrap();
        let store = VersionStore::new(Arc::new(storage), VersionConfig::default()).unwrap();
        let mut version = Version::new(1);
        version.set_fence_name("fenceA");
        version.add_segment(0);
        store.commit(&mut version).unwrap();

        let mut next = version.clone_with_fence("fenceA");
        next.set_version_id(3);
        next.add_segment(1);
        store.commit(&mut next).unwrap();
        store
    }

    #[test]
    fn test_check_version_clean() {
        let temp_dir = TempDir::new().unwrap();
        let store = commit_versions(temp_dir.path());
        let version = store.load_required(3).unwrap();
        assert!(check_version(&version).is_empty());
    }

    #[test]
    fn test_check_version_reports_unsealed() {
        let version = Version::new(2);
        let issues = check_version(&version);
        assert_eq!(issues, vec!["version is not sealed".to_string()]);
    }

    #[test]
    fn test_list_and_show() {
        let temp_dir = TempDir::new().unwrap();
        commit_versions(temp_dir.path());
        execute_command(args_for(temp_dir.path(), "list")).unwrap();
        execute_command(args_for(temp_dir.path(), "show")).unwrap();
    }

    #[test]
    fn test_validate_fails_on_corrupt_document() {
        let temp_dir = TempDir::new().unwrap();
        commit_versions(temp_dir.path());
        execute_command(args_for(temp_dir.path(), "validate")).unwrap();

        std::fs::write(temp_dir.path().join("version.5"), b"{\"versionid\": 5").unwrap();
        assert!(execute_command(args_for(temp_dir.path(), "validate")).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(execute_command(args_for(&missing, "list")).is_err());
    }
}
