//! The version descriptor.

use std::collections::BTreeMap;
use std::fmt;

use log::{error, warn};

use crate::version::line::{VersionCoord, VersionLine};
use crate::version::locator::Locator;
use crate::version::roadmap::SchemaVersionRoadmap;
use crate::version::segment::{SegmentInfo, SegmentLineage};
use crate::version::segment_descriptions::SegmentDescriptions;
use crate::version::task::{IndexTaskHistory, IndexTaskQueue};
use crate::version::{
    CURRENT_FORMAT_VERSION, DEFAULT_SCHEMA_ID, INVALID_VERSION_ID, SchemaId, SegmentId,
    VERSION_FILE_PREFIX, VersionId, is_public_version_id,
};

/// Snapshot of the segments and schema forming a partition's index.
///
/// A version has a single writer, the holder of its fence. The writer
/// mutates it while building, calls [`Version::finalize`] once and persists
/// it; afterwards it is treated as immutable and shared through clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub(crate) version_id: VersionId,
    pub(crate) schema_id: SchemaId,
    pub(crate) read_schema_id: SchemaId,
    pub(crate) format_version: u32,
    pub(crate) commit_time: i64,
    pub(crate) fence_name: String,
    pub(crate) sealed: bool,
    pub(crate) locator: Locator,
    pub(crate) segments: SegmentLineage,
    pub(crate) roadmap: SchemaVersionRoadmap,
    pub(crate) description: BTreeMap<String, String>,
    pub(crate) version_line: VersionLine,
    pub(crate) segment_descriptions: SegmentDescriptions,
    pub(crate) task_history: IndexTaskHistory,
    pub(crate) task_queue: IndexTaskQueue,
}

impl Default for Version {
    fn default() -> Self {
        Version::new(INVALID_VERSION_ID)
    }
}

impl Version {
    /// Create an empty version authored against the default schema.
    pub fn new(version_id: VersionId) -> Self {
        Version::with_schema(version_id, DEFAULT_SCHEMA_ID)
    }

    /// Create an empty version authored against `schema_id`.
    pub fn with_schema(version_id: VersionId, schema_id: SchemaId) -> Self {
        let mut roadmap = SchemaVersionRoadmap::new();
        roadmap.insert(schema_id);
        Version {
            version_id,
            schema_id,
            read_schema_id: schema_id,
            format_version: CURRENT_FORMAT_VERSION,
            commit_time: 0,
            fence_name: String::new(),
            sealed: false,
            locator: Locator::default(),
            segments: SegmentLineage::new(),
            roadmap,
            description: BTreeMap::new(),
            version_line: VersionLine::new(),
            segment_descriptions: SegmentDescriptions::new(),
            task_history: IndexTaskHistory::new(),
            task_queue: IndexTaskQueue::new(),
        }
    }

    pub fn version_id(&self) -> VersionId {
        self.version_id
    }

    pub fn set_version_id(&mut self, version_id: VersionId) {
        self.version_id = version_id;
    }

    /// Advance to the next version id, starting at 0 for a fresh version.
    pub fn inc_version_id(&mut self) {
        self.version_id = if self.version_id < 0 {
            0
        } else {
            self.version_id + 1
        };
    }

    pub fn is_valid(&self) -> bool {
        self.version_id != INVALID_VERSION_ID
    }

    pub fn is_public(&self) -> bool {
        is_public_version_id(self.version_id)
    }

    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    /// Author this version against `schema_id` and fold it into the road-map.
    ///
    /// A read schema newer than `schema_id` is pulled down to it.
    pub fn set_schema_id(&mut self, schema_id: SchemaId) {
        self.schema_id = schema_id;
        if self.read_schema_id > schema_id {
            warn!(
                "version [{}]: read schema id [{}] is newer than schema id [{schema_id}], clamped",
                self.version_id, self.read_schema_id
            );
            self.read_schema_id = schema_id;
        }
        self.update_schema_version_roadmap();
    }

    pub fn read_schema_id(&self) -> SchemaId {
        self.read_schema_id
    }

    /// Set the schema readers should use. It never exceeds the version's own.
    pub fn set_read_schema_id(&mut self, read_schema_id: SchemaId) {
        if read_schema_id > self.schema_id {
            warn!(
                "version [{}]: read schema id [{read_schema_id}] is newer than schema id [{}], clamped",
                self.version_id, self.schema_id
            );
        }
        self.read_schema_id = read_schema_id.min(self.schema_id);
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn commit_time(&self) -> i64 {
        self.commit_time
    }

    pub fn set_commit_time(&mut self, commit_time: i64) {
        self.commit_time = commit_time;
    }

    pub fn fence_name(&self) -> &str {
        &self.fence_name
    }

    pub fn set_fence_name<S: Into<String>>(&mut self, fence_name: S) {
        self.fence_name = fence_name.into();
    }

    pub fn coord(&self) -> VersionCoord {
        VersionCoord::new(self.version_id, self.fence_name.clone())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Mark the version immutable and fully durable.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn set_locator(&mut self, locator: Locator) {
        self.locator = locator;
    }

    pub fn add_segment(&mut self, segment_id: SegmentId) {
        self.add_segment_with_schema(segment_id, self.schema_id);
    }

    pub fn add_segment_with_schema(&mut self, segment_id: SegmentId, schema_id: SchemaId) {
        self.segments.add(segment_id, schema_id);
        self.segment_descriptions.on_segment_added(segment_id);
    }

    /// Remove a segment. Absent ids are ignored.
    pub fn remove_segment(&mut self, segment_id: SegmentId) {
        if self.segments.remove(segment_id) {
            self.segment_descriptions.on_segment_removed(segment_id);
        }
    }

    pub fn has_segment(&self, segment_id: SegmentId) -> bool {
        self.segments.contains(segment_id)
    }

    /// Re-tag a segment with another schema already in the road-map.
    ///
    /// A schema id missing from the road-map is a programming error; it
    /// panics in debug builds and leaves the version untouched otherwise.
    pub fn update_segment_schema_id(&mut self, segment_id: SegmentId, schema_id: SchemaId) {
        let known = self.roadmap.contains(schema_id);
        debug_assert!(
            known,
            "schema id {schema_id} is not in the road-map of version {}",
            self.version_id
        );
        if !known {
            error!(
                "version [{}]: schema id [{schema_id}] not in road-map {:?}, segment [{segment_id}] unchanged",
                self.version_id,
                self.roadmap.ids()
            );
            return;
        }
        if !self.segments.update_schema_id(segment_id, schema_id) {
            warn!(
                "version [{}]: segment [{segment_id}] not found, schema id not updated",
                self.version_id
            );
        }
    }

    pub fn segments(&self) -> &[SegmentInfo] {
        self.segments.segments()
    }

    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.segment_ids()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment_schema_id(&self, segment_id: SegmentId) -> Option<SchemaId> {
        self.segments.schema_id(segment_id)
    }

    pub fn last_segment_id(&self) -> SegmentId {
        self.segments.last_segment_id()
    }

    pub fn set_last_segment_id(&mut self, segment_id: SegmentId) {
        self.segments.set_last_segment_id(segment_id);
    }

    /// Segments of this version absent from `other`.
    pub fn segments_not_in(&self, other: &Version) -> Vec<SegmentId> {
        self.segments
            .segments()
            .iter()
            .map(|info| info.segment_id)
            .filter(|id| !other.has_segment(*id))
            .collect()
    }

    /// Confirm segment ids are strictly increasing.
    pub fn validate(&self) -> bool {
        self.segments.validate()
    }

    pub fn schema_version_roadmap(&self) -> &SchemaVersionRoadmap {
        &self.roadmap
    }

    pub fn is_in_schema_version_roadmap(&self, schema_id: SchemaId) -> bool {
        self.roadmap.contains(schema_id)
    }

    /// Fold the version's and its segments' schema ids into the road-map.
    pub fn update_schema_version_roadmap(&mut self) -> bool {
        self.roadmap
            .update(self.version_id, self.schema_id, self.segments.segments())
    }

    pub fn description(&self) -> &BTreeMap<String, String> {
        &self.description
    }

    pub fn add_description<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.description.insert(key.into(), value.into());
    }

    pub fn get_description(&self, key: &str) -> Option<&str> {
        self.description.get(key).map(String::as_str)
    }

    pub fn version_line(&self) -> &VersionLine {
        &self.version_line
    }

    pub fn segment_descriptions(&self) -> &SegmentDescriptions {
        &self.segment_descriptions
    }

    pub fn segment_descriptions_mut(&mut self) -> &mut SegmentDescriptions {
        &mut self.segment_descriptions
    }

    pub fn task_history(&self) -> &IndexTaskHistory {
        &self.task_history
    }

    pub fn task_history_mut(&mut self) -> &mut IndexTaskHistory {
        &mut self.task_history
    }

    pub fn task_queue(&self) -> &IndexTaskQueue {
        &self.task_queue
    }

    pub fn task_queue_mut(&mut self) -> &mut IndexTaskQueue {
        &mut self.task_queue
    }

    /// Close the building phase of this version.
    ///
    /// Refreshes the road-map and, for a public fenced version, appends
    /// `(version_id, fence_name)` to the version line.
    pub fn finalize(&mut self) {
        self.update_schema_version_roadmap();
        if self.is_public() && !self.fence_name.is_empty() {
            self.version_line.add_current_version(self.coord());
        }
    }

    /// Whether `finalize` would leave this version unchanged.
    pub fn is_finalized(&self) -> bool {
        let line_current = !self.is_public()
            || self.fence_name.is_empty()
            || *self.version_line.head_version() == self.coord();
        line_current
            && self
                .roadmap
                .covers(self.schema_id, self.segments.segments())
    }

    /// Whether a holder of `coord` may fast-forward to this version.
    pub fn can_fast_forward_from(&self, coord: &VersionCoord, has_building_segment: bool) -> bool {
        self.version_line
            .can_fast_forward_from(coord, has_building_segment)
    }

    /// Independent copy for a different writer epoch.
    pub fn clone_with_fence<S: Into<String>>(&self, new_fence_name: S) -> Version {
        let mut cloned = self.clone();
        cloned.fence_name = new_fence_name.into();
        cloned
    }

    /// Name of the persisted document of this version.
    pub fn version_file_name(&self) -> String {
        format!("{VERSION_FILE_PREFIX}.{}", self.version_id)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {} [schema {}, fence '{}', {} segments, last segment {}{}]",
            self.version_id,
            self.schema_id,
            self.fence_name,
            self.segments.len(),
            self.segments.last_segment_id(),
            if self.sealed { ", sealed" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::locator::Offset;

    #[test]
    fn test_add_segment_scenario() {
        let mut version = Version::new(7);
        version.add_segment_with_schema(3, 1);
        version.add_segment_with_schema(1, 1);

        assert_eq!(
            version.segments(),
            &[SegmentInfo::new(1, 1), SegmentInfo::new(3, 1)]
        );
        assert_eq!(version.last_segment_id(), 3);
        assert!(version.validate());
    }

    #[test]
    fn test_add_segment_uses_current_schema() {
        let mut version = Version::with_schema(1, 4);
        version.add_segment(0);
        assert_eq!(version.segment_schema_id(0), Some(4));
    }

    #[test]
    fn test_remove_segment() {
        let mut version = Version::new(1);
        version.add_segment(1);
        version.add_segment(2);
        version.remove_segment(2);
        version.remove_segment(9);

        assert_eq!(version.segment_ids(), vec![1]);
        assert!(!version.has_segment(2));
        assert_eq!(version.last_segment_id(), 2);
    }

    #[test]
    fn test_future_segment_schema_not_added_to_roadmap() {
        let mut version = Version::with_schema(7, 1);
        version.add_segment_with_schema(0, 5);
        assert!(!version.update_schema_version_roadmap());
        assert_eq!(version.schema_version_roadmap().ids(), &[1]);
    }

    #[test]
    fn test_set_schema_id_extends_roadmap() {
        let mut version = Version::with_schema(1, 1);
        version.add_segment(0);
        version.set_schema_id(2);
        version.add_segment(1);

        assert_eq!(version.schema_version_roadmap().ids(), &[1, 2]);
        assert!(version.is_in_schema_version_roadmap(1));
        version.update_segment_schema_id(0, 2);
        assert_eq!(version.segment_schema_id(0), Some(2));
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_update_segment_schema_id_requires_known_schema() {
        let mut version = Version::with_schema(1, 1);
        version.add_segment(0);
        version.update_segment_schema_id(0, 9);
    }

    #[test]
    fn test_read_schema_id_is_clamped() {
        let mut version = Version::with_schema(1, 3);
        version.set_read_schema_id(2);
        assert_eq!(version.read_schema_id(), 2);
        version.set_read_schema_id(8);
        assert_eq!(version.read_schema_id(), 3);
    }

    #[test]
    fn test_lowering_schema_id_clamps_read_schema_id() {
        let mut version = Version::with_schema(1, 5);
        assert_eq!(version.read_schema_id(), 5);

        version.set_schema_id(3);
        assert_eq!(version.schema_id(), 3);
        assert_eq!(version.read_schema_id(), 3);

        version.set_schema_id(6);
        assert_eq!(version.read_schema_id(), 3);
    }

    #[test]
    fn test_is_finalized() {
        let mut version = Version::new(3);
        version.set_fence_name("fenceA");
        assert!(!version.is_finalized());
        version.finalize();
        assert!(version.is_finalized());

        let mut mixed = Version::with_schema(2, 2);
        mixed.add_segment_with_schema(0, 1);
        assert!(!mixed.is_finalized());
        mixed.finalize();
        assert!(mixed.is_finalized());

        // Segments from a future schema are never folded in.
        mixed.add_segment_with_schema(1, 4);
        assert!(mixed.is_finalized());

        let mut private = Version::new(2);
        private.set_fence_name("fenceA");
        assert!(private.is_finalized());
    }

    #[test]
    fn test_finalize_public_fenced_version() {
        let mut version = Version::new(7);
        version.set_fence_name("fenceA");
        version.finalize();
        assert_eq!(version.version_line().head_version(), &VersionCoord::new(7, "fenceA"));
        assert!(version.can_fast_forward_from(&VersionCoord::new(7, "fenceA"), false));
    }

    #[test]
    fn test_finalize_skips_private_or_unfenced() {
        let mut private = Version::new(8);
        private.set_fence_name("fenceA");
        private.finalize();
        assert!(private.version_line().is_empty());

        let mut unfenced = Version::new(9);
        unfenced.finalize();
        assert!(unfenced.version_line().is_empty());
    }

    #[test]
    fn test_successor_can_fast_forward_from_predecessor() {
        let mut v1 = Version::new(1);
        v1.set_fence_name("fenceA");
        v1.add_segment(0);
        v1.finalize();

        let mut v3 = v1.clone_with_fence("fenceB");
        v3.set_version_id(3);
        v3.add_segment(1);
        v3.finalize();

        assert!(v3.can_fast_forward_from(&v1.coord(), false));
        assert!(!v1.can_fast_forward_from(&v3.coord(), false));
    }

    #[test]
    fn test_clone_with_fence() {
        let mut version = Version::with_schema(5, 2);
        version.set_fence_name("fenceA");
        version.add_segment(0);
        version.set_locator(Locator::from_legacy_timestamp(99));

        let cloned = version.clone_with_fence("fenceB");
        assert_eq!(cloned.fence_name(), "fenceB");
        assert_eq!(cloned.segments(), version.segments());
        assert_eq!(cloned.schema_id(), version.schema_id());
        assert_eq!(cloned.locator(), version.locator());
        assert!(cloned.locator().is_legacy_locator());
        assert_eq!(version.fence_name(), "fenceA");
    }

    #[test]
    fn test_segments_not_in() {
        let mut merged = Version::new(3);
        merged.add_segment(0);
        merged.add_segment(4);
        let mut base = Version::new(1);
        base.add_segment(0);
        base.add_segment(1);

        assert_eq!(merged.segments_not_in(&base), vec![4]);
        assert_eq!(base.segments_not_in(&merged), vec![1]);
    }

    #[test]
    fn test_inc_version_id_and_file_name() {
        let mut version = Version::default();
        assert!(!version.is_valid());
        version.inc_version_id();
        assert_eq!(version.version_id(), 0);
        version.inc_version_id();
        assert_eq!(version.version_file_name(), "version.1");
        assert!(version.is_public());
    }

    #[test]
    fn test_display() {
        let mut version = Version::new(3);
        version.set_fence_name("f");
        version.add_segment(2);
        version.set_locator(Locator::new(1, Offset::new(5, 0)));
        version.seal();
        assert_eq!(
            version.to_string(),
            "version 3 [schema 0, fence 'f', 1 segments, last segment 2, sealed]"
        );
    }
}
