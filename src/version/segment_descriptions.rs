//! Per-segment side table: level layout and segment statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::version::SegmentId;

/// How segments are arranged across levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelTopology {
    Sequence,
    HashMod,
    KeyRange,
}

/// Segments assigned to one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelMeta {
    pub level_idx: u32,

    #[serde(default)]
    pub cursor: u32,

    #[serde(default)]
    pub segments: Vec<SegmentId>,
}

/// Level layout of a version's segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub topology: LevelTopology,
    pub levels: Vec<LevelMeta>,
}

impl LevelInfo {
    /// Create `level_count` empty levels.
    pub fn new(topology: LevelTopology, level_count: u32) -> Self {
        LevelInfo {
            topology,
            levels: (0..level_count.max(1))
                .map(|level_idx| LevelMeta {
                    level_idx,
                    cursor: 0,
                    segments: Vec::new(),
                })
                .collect(),
        }
    }

    /// Level holding `segment_id`, if any.
    pub fn level_of(&self, segment_id: SegmentId) -> Option<u32> {
        self.levels
            .iter()
            .find(|level| level.segments.contains(&segment_id))
            .map(|level| level.level_idx)
    }
}

/// Integer statistics of one segment, e.g. the min/max of a sort field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStatistics {
    pub segment_id: SegmentId,

    #[serde(default)]
    pub integer_stats: BTreeMap<String, (i64, i64)>,
}

/// Side table describing the segments of a version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDescriptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level_info: Option<LevelInfo>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    segment_statistics: Vec<SegmentStatistics>,
}

impl SegmentDescriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.level_info.is_none() && self.segment_statistics.is_empty()
    }

    pub fn level_info(&self) -> Option<&LevelInfo> {
        self.level_info.as_ref()
    }

    pub fn set_level_info(&mut self, level_info: LevelInfo) {
        self.level_info = Some(level_info);
    }

    pub fn segment_statistics(&self) -> &[SegmentStatistics] {
        &self.segment_statistics
    }

    pub fn statistics_of(&self, segment_id: SegmentId) -> Option<&SegmentStatistics> {
        self.segment_statistics
            .iter()
            .find(|stats| stats.segment_id == segment_id)
    }

    /// Insert or replace the statistics of a segment, kept sorted by id.
    pub fn set_statistics(&mut self, stats: SegmentStatistics) {
        match self
            .segment_statistics
            .binary_search_by_key(&stats.segment_id, |s| s.segment_id)
        {
            Ok(pos) => self.segment_statistics[pos] = stats,
            Err(pos) => self.segment_statistics.insert(pos, stats),
        }
    }

    /// Place a new segment on level 0, when a level layout exists.
    pub fn on_segment_added(&mut self, segment_id: SegmentId) {
        if let Some(level_info) = self.level_info.as_mut() {
            if level_info.level_of(segment_id).is_some() {
                return;
            }
            if let Some(level) = level_info.levels.first_mut() {
                level.segments.push(segment_id);
            }
        }
    }

    /// Drop every trace of a removed segment.
    pub fn on_segment_removed(&mut self, segment_id: SegmentId) {
        if let Some(level_info) = self.level_info.as_mut() {
            for level in &mut level_info.levels {
                level.segments.retain(|id| *id != segment_id);
            }
        }
        self.segment_statistics
            .retain(|stats| stats.segment_id != segment_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_follow_add_and_remove() {
        let mut descriptions = SegmentDescriptions::new();
        assert!(descriptions.is_empty());

        descriptions.on_segment_added(1);
        assert!(descriptions.level_info().is_none());

        descriptions.set_level_info(LevelInfo::new(LevelTopology::Sequence, 2));
        descriptions.on_segment_added(1);
        descriptions.on_segment_added(1);
        descriptions.on_segment_added(2);
        let level_info = descriptions.level_info().unwrap();
        assert_eq!(level_info.levels[0].segments, vec![1, 2]);
        assert_eq!(level_info.level_of(2), Some(0));

        descriptions.set_statistics(SegmentStatistics {
            segment_id: 2,
            integer_stats: BTreeMap::from([("ts".to_string(), (10, 20))]),
        });
        assert!(descriptions.statistics_of(2).is_some());

        descriptions.on_segment_removed(2);
        assert!(descriptions.statistics_of(2).is_none());
        assert_eq!(descriptions.level_info().unwrap().level_of(2), None);
    }

    #[test]
    fn test_statistics_sorted_by_segment() {
        let mut descriptions = SegmentDescriptions::new();
        for id in [5, 1, 3, 1] {
            descriptions.set_statistics(SegmentStatistics {
                segment_id: id,
                integer_stats: BTreeMap::new(),
            });
        }
        let ids: Vec<_> = descriptions
            .segment_statistics()
            .iter()
            .map(|s| s.segment_id)
            .collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }
}
