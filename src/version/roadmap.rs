//! Sorted set of schema ids a version can be read under.
//!
//! The road-map only grows. Every segment's schema id must be in it, so a
//! reader pinned to an older schema can still interpret each segment of a
//! lineage that evolved while it was running.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::version::segment::SegmentInfo;
use crate::version::{SchemaId, VersionId};

/// Monotonically growing, sorted set of schema ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersionRoadmap {
    schema_ids: Vec<SchemaId>,
}

impl SchemaVersionRoadmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a road-map from possibly unsorted ids.
    pub fn from_ids(mut schema_ids: Vec<SchemaId>) -> Self {
        schema_ids.sort_unstable();
        schema_ids.dedup();
        SchemaVersionRoadmap { schema_ids }
    }

    pub fn ids(&self) -> &[SchemaId] {
        &self.schema_ids
    }

    pub fn len(&self) -> usize {
        self.schema_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema_ids.is_empty()
    }

    pub fn contains(&self, schema_id: SchemaId) -> bool {
        self.schema_ids.binary_search(&schema_id).is_ok()
    }

    /// Insert a schema id. Returns false if it was already present.
    pub fn insert(&mut self, schema_id: SchemaId) -> bool {
        match self.schema_ids.binary_search(&schema_id) {
            Ok(_) => false,
            Err(pos) => {
                self.schema_ids.insert(pos, schema_id);
                true
            }
        }
    }

    /// Fold the version's schema and its segments' schemas into the map.
    ///
    /// Segments claiming a schema newer than the version's own are skipped
    /// with a warning: an older schema cannot absorb one from the future.
    /// Missing schema ids are inserted with a warning. The stored ids are
    /// replaced only when something changed. Returns whether it changed.
    pub fn update(
        &mut self,
        version_id: VersionId,
        schema_id: SchemaId,
        segments: &[SegmentInfo],
    ) -> bool {
        let mut updated = self.schema_ids.clone();
        if !updated.contains(&schema_id) {
            updated.push(schema_id);
        }

        for segment in segments {
            if segment.schema_id > schema_id {
                warn!(
                    "version [{version_id}]: segment [{}] schema id [{}] is newer than version schema id [{schema_id}], skipped",
                    segment.segment_id, segment.schema_id
                );
                continue;
            }
            if !updated.contains(&segment.schema_id) {
                warn!(
                    "version [{version_id}]: segment [{}] schema id [{}] missing from road-map, inserted",
                    segment.segment_id, segment.schema_id
                );
                updated.push(segment.schema_id);
            }
        }

        updated.sort_unstable();
        if updated == self.schema_ids {
            return false;
        }
        self.schema_ids = updated;
        true
    }

    /// Whether `update` with the same arguments would change nothing.
    pub fn covers(&self, schema_id: SchemaId, segments: &[SegmentInfo]) -> bool {
        self.contains(schema_id)
            && segments
                .iter()
                .filter(|segment| segment.schema_id <= schema_id)
                .all(|segment| self.contains(segment.schema_id))
    }
}
