//! Ordered list of the segments composing a version.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::version::{INVALID_SEGMENT_ID, SchemaId, SegmentId};

/// A segment and the schema it was authored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Segment identifier.
    pub segment_id: SegmentId,

    /// Schema the segment was written with.
    pub schema_id: SchemaId,
}

impl SegmentInfo {
    pub fn new(segment_id: SegmentId, schema_id: SchemaId) -> Self {
        SegmentInfo {
            segment_id,
            schema_id,
        }
    }
}

/// Segments of a version, sorted by id, with constant-time membership.
///
/// `last_segment_id` never decreases: removing the newest segment keeps it,
/// so ids are never reused within one lineage.
#[derive(Debug, Clone)]
pub struct SegmentLineage {
    segments: Vec<SegmentInfo>,
    members: HashSet<SegmentId>,
    last_segment_id: SegmentId,
}

impl Default for SegmentLineage {
    fn default() -> Self {
        SegmentLineage {
            segments: Vec::new(),
            members: HashSet::new(),
            last_segment_id: INVALID_SEGMENT_ID,
        }
    }
}

impl PartialEq for SegmentLineage {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.last_segment_id == other.last_segment_id
    }
}

impl SegmentLineage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a lineage from decoded segments.
    ///
    /// Unsorted or duplicated ids are repaired: the list is sorted and only
    /// the first entry for each id is kept. Returns the lineage and whether a
    /// repair was needed.
    pub fn from_segments(mut segments: Vec<SegmentInfo>) -> (Self, bool) {
        let mut lineage = SegmentLineage::new();
        let was_valid = segments
            .windows(2)
            .all(|pair| pair[0].segment_id < pair[1].segment_id);
        if !was_valid {
            segments.sort_by_key(|info| info.segment_id);
            segments.dedup_by_key(|info| info.segment_id);
        }
        for info in &segments {
            lineage.members.insert(info.segment_id);
            lineage.last_segment_id = lineage.last_segment_id.max(info.segment_id);
        }
        lineage.segments = segments;
        (lineage, !was_valid)
    }

    /// Add a segment, keeping the list sorted by id.
    ///
    /// Adding an id that is already present replaces its schema id.
    pub fn add(&mut self, segment_id: SegmentId, schema_id: SchemaId) {
        if self.members.contains(&segment_id) {
            self.update_schema_id(segment_id, schema_id);
            return;
        }
        let pos = self
            .segments
            .partition_point(|info| info.segment_id < segment_id);
        self.segments
            .insert(pos, SegmentInfo::new(segment_id, schema_id));
        self.members.insert(segment_id);
        self.last_segment_id = self.last_segment_id.max(segment_id);
    }

    /// Remove a segment. Returns false if it was not present.
    pub fn remove(&mut self, segment_id: SegmentId) -> bool {
        if !self.members.remove(&segment_id) {
            return false;
        }
        self.segments.retain(|info| info.segment_id != segment_id);
        true
    }

    /// Set the schema id of a segment. Returns false if it was not present.
    pub fn update_schema_id(&mut self, segment_id: SegmentId, schema_id: SchemaId) -> bool {
        match self.position(segment_id) {
            Some(pos) => {
                self.segments[pos].schema_id = schema_id;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, segment_id: SegmentId) -> bool {
        self.members.contains(&segment_id)
    }

    pub fn schema_id(&self, segment_id: SegmentId) -> Option<SchemaId> {
        self.position(segment_id)
            .map(|pos| self.segments[pos].schema_id)
    }

    pub fn segments(&self) -> &[SegmentInfo] {
        &self.segments
    }

    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(|info| info.segment_id).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_segment_id(&self) -> SegmentId {
        self.last_segment_id
    }

    /// Raise the last segment id. Lower values are ignored.
    pub fn set_last_segment_id(&mut self, segment_id: SegmentId) {
        self.last_segment_id = self.last_segment_id.max(segment_id);
    }

    /// Confirm the ids are strictly increasing.
    pub fn validate(&self) -> bool {
        self.segments
            .windows(2)
            .all(|pair| pair[0].segment_id < pair[1].segment_id)
    }

    fn position(&self, segment_id: SegmentId) -> Option<usize> {
        if !self.members.contains(&segment_id) {
            return None;
        }
        self.segments
            .binary_search_by_key(&segment_id, |info| info.segment_id)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_order() {
        let mut lineage = SegmentLineage::new();
        lineage.add(3, 1);
        lineage.add(1, 1);
        lineage.add(2, 0);

        assert_eq!(lineage.segment_ids(), vec![1, 2, 3]);
        assert_eq!(lineage.last_segment_id(), 3);
        assert!(lineage.validate());
        assert!(lineage.contains(2));
        assert!(!lineage.contains(4));
    }

    #[test]
    fn test_empty_lineage_has_invalid_last_id() {
        let lineage = SegmentLineage::new();
        assert!(lineage.is_empty());
        assert_eq!(lineage.last_segment_id(), INVALID_SEGMENT_ID);
        assert!(lineage.validate());
    }

    #[test]
    fn test_remove_keeps_last_segment_id() {
        let mut lineage = SegmentLineage::new();
        lineage.add(1, 0);
        lineage.add(5, 0);

        assert!(lineage.remove(5));
        assert!(!lineage.remove(5));
        assert_eq!(lineage.segment_ids(), vec![1]);
        assert_eq!(lineage.last_segment_id(), 5);
        assert!(!lineage.contains(5));
    }

    #[test]
    fn test_add_existing_replaces_schema() {
        let mut lineage = SegmentLineage::new();
        lineage.add(4, 1);
        lineage.add(4, 2);
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage.schema_id(4), Some(2));
    }

    #[test]
    fn test_from_segments_repairs_order() {
        let (lineage, repaired) = SegmentLineage::from_segments(vec![
            SegmentInfo::new(5, 0),
            SegmentInfo::new(2, 0),
            SegmentInfo::new(5, 1),
        ]);
        assert!(repaired);
        assert_eq!(lineage.segment_ids(), vec![2, 5]);
        assert_eq!(lineage.last_segment_id(), 5);
        assert!(lineage.validate());

        let (_, repaired) =
            SegmentLineage::from_segments(vec![SegmentInfo::new(1, 0), SegmentInfo::new(2, 0)]);
        assert!(!repaired);
    }

    #[test]
    fn test_random_insertion_order_stays_sorted() {
        let ids = [17, 3, 9, 1, 12, 4, 20, 0, 8];
        let mut lineage = SegmentLineage::new();
        for id in ids {
            lineage.add(id, 0);
            assert!(lineage.validate());
        }
        let mut expected = ids.to_vec();
        expected.sort();
        assert_eq!(lineage.segment_ids(), expected);
        assert_eq!(lineage.last_segment_id(), 20);
    }
}
