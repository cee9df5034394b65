//! Version descriptors for a partition's index.
//!
//! A [`Version`] records which immutable segments and which schema form a
//! consistent snapshot of a partition. Builders mutate a version while they
//! work, call [`Version::finalize`] once, and persist it through the
//! [`codec`] and a [`VersionStore`]. Readers and mergers decode persisted
//! versions and consult the [`VersionLine`] to decide whether a newly
//! observed version may be fast-forwarded from one they already hold.
//!
//! # Components
//!
//! - [`Locator`]: progress watermark correlating a version with its source
//! - [`SegmentLineage`]: ordered segment ids with per-segment schema ids
//! - [`SchemaVersionRoadmap`]: sorted set of compatible schema ids
//! - [`VersionLine`]: bounded history of fence coordinates
//! - [`codec`]: JSON document encoding with format migration

pub mod codec;
pub mod config;
pub mod descriptor;
pub mod line;
pub mod locator;
pub mod roadmap;
pub mod segment;
pub mod segment_descriptions;
pub mod store;
pub mod task;

pub use config::VersionConfig;
pub use descriptor::Version;
pub use line::{VersionCoord, VersionLine};
pub use locator::{Locator, Offset};
pub use roadmap::SchemaVersionRoadmap;
pub use segment::{SegmentInfo, SegmentLineage};
pub use segment_descriptions::SegmentDescriptions;
pub use store::VersionStore;
pub use task::{IndexTaskHistory, IndexTaskQueue};

/// Identifier of a version, scoped to one partition.
pub type VersionId = i32;

/// Identifier of an immutable segment.
pub type SegmentId = i32;

/// Identifier of a schema revision.
pub type SchemaId = u32;

/// Version id of a descriptor that has not been numbered yet.
pub const INVALID_VERSION_ID: VersionId = -1;

/// Segment id reported when a lineage holds no segment.
pub const INVALID_SEGMENT_ID: SegmentId = -1;

/// Schema id of a table that never evolved its schema.
pub const DEFAULT_SCHEMA_ID: SchemaId = 0;

/// Versions whose id has this bit set are public and tracked by the line.
pub const PUBLIC_VERSION_ID_MASK: VersionId = 1;

/// On-disk layout generation written by this crate.
pub const CURRENT_FORMAT_VERSION: u32 = 3;

/// Layout generation assumed for documents without `format_version`.
pub const LEGACY_FORMAT_VERSION: u32 = 1;

/// First layout generation that persists a locator.
pub const LOCATOR_FORMAT_VERSION: u32 = 3;

/// Prefix of version file names; the full name is `version.<id>`.
pub const VERSION_FILE_PREFIX: &str = "version";

/// Whether `version_id` names a public version.
///
/// Intermediate versions produced by a builder are private and never enter
/// the fence line.
pub fn is_public_version_id(version_id: VersionId) -> bool {
    version_id >= 0 && (version_id & PUBLIC_VERSION_ID_MASK) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_version_id() {
        assert!(is_public_version_id(1));
        assert!(is_public_version_id(7));
        assert!(!is_public_version_id(0));
        assert!(!is_public_version_id(8));
        assert!(!is_public_version_id(INVALID_VERSION_ID));
    }
}
