//! Fence lineage of public versions.
//!
//! Each finalized public version appends its `(version_id, fence_name)`
//! coordinate to the line it inherited from its predecessor. A reader that
//! holds version A and observes version B may adopt B without re-reading
//! A's full segment set when A's coordinate is in B's line: B was built on
//! top of A, whatever writer epoch produced it.

use std::collections::VecDeque;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::version::{INVALID_VERSION_ID, VersionId};

/// Number of ancestors retained behind the head.
pub const MAX_PARENT_VERSIONS: usize = 5;

/// A version as seen by a particular writer epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionCoord {
    pub version_id: VersionId,

    #[serde(default)]
    pub fence_name: String,
}

impl VersionCoord {
    pub fn new<S: Into<String>>(version_id: VersionId, fence_name: S) -> Self {
        VersionCoord {
            version_id,
            fence_name: fence_name.into(),
        }
    }

    pub fn invalid() -> Self {
        VersionCoord::new(INVALID_VERSION_ID, "")
    }

    pub fn is_valid(&self) -> bool {
        self.version_id != INVALID_VERSION_ID
    }
}

impl Default for VersionCoord {
    fn default() -> Self {
        VersionCoord::invalid()
    }
}

impl fmt::Display for VersionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.version_id, self.fence_name)
    }
}

/// Bounded, append-only history of fence coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLine {
    #[serde(rename = "head_version", default)]
    head: VersionCoord,

    /// Ancestors of the head, oldest first.
    #[serde(rename = "parent_versions", default)]
    parents: VecDeque<VersionCoord>,
}

impl VersionLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head_version(&self) -> &VersionCoord {
        &self.head
    }

    pub fn parent_versions(&self) -> impl Iterator<Item = &VersionCoord> {
        self.parents.iter()
    }

    pub fn is_empty(&self) -> bool {
        !self.head.is_valid()
    }

    /// Make `coord` the new head, pushing the previous head into history.
    ///
    /// Re-adding the current head is a no-op, so finalizing a decoded version
    /// again does not duplicate it.
    pub fn add_current_version(&mut self, coord: VersionCoord) {
        if coord == self.head {
            return;
        }
        let previous = std::mem::replace(&mut self.head, coord);
        if previous.is_valid() {
            self.parents.push_back(previous);
            while self.parents.len() > MAX_PARENT_VERSIONS {
                self.parents.pop_front();
            }
        }
    }

    /// Whether a holder of `coord` may fast-forward to the head of this line.
    ///
    /// Without a building segment, any recorded coordinate qualifies. A
    /// reader with a building segment holds unsealed data produced under the
    /// head's fence, so only coordinates of that same fence qualify.
    pub fn can_fast_forward_from(&self, coord: &VersionCoord, has_building_segment: bool) -> bool {
        if !coord.is_valid() {
            return false;
        }
        if *coord == self.head {
            return true;
        }
        let recorded = self.parents.iter().any(|parent| parent == coord);
        let allowed =
            recorded && (!has_building_segment || coord.fence_name == self.head.fence_name);
        debug!(
            "fast forward from {coord} to head {}: recorded [{recorded}], building [{has_building_segment}], allowed [{allowed}]",
            self.head
        );
        allowed
    }
}

impl fmt::Display for VersionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "head {}", self.head)?;
        if !self.parents.is_empty() {
            write!(f, " <-")?;
            for parent in self.parents.iter().rev() {
                write!(f, " {parent}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_added_coord() {
        let mut line = VersionLine::new();
        let c = VersionCoord::new(1, "fenceA");
        line.add_current_version(c.clone());
        line.add_current_version(VersionCoord::new(3, "fenceA"));

        assert!(line.can_fast_forward_from(&c, false));
        assert!(line.can_fast_forward_from(&VersionCoord::new(3, "fenceA"), false));
        assert!(!line.can_fast_forward_from(&VersionCoord::new(5, "fenceA"), false));
        assert!(!line.can_fast_forward_from(&VersionCoord::new(1, "fenceB"), false));
    }

    #[test]
    fn test_empty_line_denies_everything() {
        let line = VersionLine::new();
        assert!(line.is_empty());
        assert!(!line.can_fast_forward_from(&VersionCoord::invalid(), false));
        assert!(!line.can_fast_forward_from(&VersionCoord::new(1, ""), false));
    }

    #[test]
    fn test_building_segment_requires_same_fence() {
        let mut line = VersionLine::new();
        line.add_current_version(VersionCoord::new(1, "fenceA"));
        line.add_current_version(VersionCoord::new(3, "fenceA"));
        line.add_current_version(VersionCoord::new(5, "fenceB"));

        let old_fence = VersionCoord::new(3, "fenceA");
        assert!(line.can_fast_forward_from(&old_fence, false));
        assert!(!line.can_fast_forward_from(&old_fence, true));
        assert!(line.can_fast_forward_from(&VersionCoord::new(5, "fenceB"), true));
    }

    #[test]
    fn test_re_adding_head_is_noop() {
        let mut line = VersionLine::new();
        line.add_current_version(VersionCoord::new(1, "f"));
        line.add_current_version(VersionCoord::new(1, "f"));
        assert_eq!(line.parent_versions().count(), 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut line = VersionLine::new();
        for id in 0..20 {
            line.add_current_version(VersionCoord::new(id * 2 + 1, "f"));
        }
        assert_eq!(line.parent_versions().count(), MAX_PARENT_VERSIONS);
        assert_eq!(line.head_version().version_id, 39);
        assert!(line.can_fast_forward_from(&VersionCoord::new(37, "f"), false));
        assert!(!line.can_fast_forward_from(&VersionCoord::new(1, "f"), false));
    }

    #[test]
    fn test_json_shape() {
        let mut line = VersionLine::new();
        line.add_current_version(VersionCoord::new(1, "a"));
        line.add_current_version(VersionCoord::new(3, "b"));
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["head_version"]["version_id"], 3);
        assert_eq!(value["parent_versions"][0]["fence_name"], "a");

        let parsed: VersionLine = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, line);
    }
}
