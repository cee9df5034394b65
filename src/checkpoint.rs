//! Savepoint acceptance for partition checkpoints.
//!
//! Workers periodically report the version their partition has reached.
//! The tracker decides, per partition, whether a report may replace the
//! last accepted savepoint. It never talks to a lock service: continuity
//! between two reports is proven by the reported version's fence line.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};

use crate::error::{Result, VersionError};
use crate::version::Version;
use crate::version::line::VersionCoord;

/// Outcome of evaluating a reported checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointDecision {
    /// First report for the partition.
    Accept,

    /// Same coordinate as the accepted savepoint.
    Unchanged,

    /// The report is a provable successor of the accepted savepoint.
    FastForward { from: VersionCoord, to: VersionCoord },

    /// The report is older than the accepted savepoint.
    Stale { accepted: VersionCoord, reported: VersionCoord },

    /// No proven continuity; the partition state must be re-derived.
    Conflict { accepted: VersionCoord, reported: VersionCoord },
}

impl CheckpointDecision {
    /// Whether the reported version may become the savepoint.
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            CheckpointDecision::Accept
                | CheckpointDecision::Unchanged
                | CheckpointDecision::FastForward { .. }
        )
    }
}

impl fmt::Display for CheckpointDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointDecision::Accept => write!(f, "accept"),
            CheckpointDecision::Unchanged => write!(f, "unchanged"),
            CheckpointDecision::FastForward { from, to } => {
                write!(f, "fast-forward {from} -> {to}")
            }
            CheckpointDecision::Stale { accepted, reported } => {
                write!(f, "stale {reported}, accepted {accepted}")
            }
            CheckpointDecision::Conflict { accepted, reported } => {
                write!(f, "conflict {reported}, accepted {accepted}")
            }
        }
    }
}

/// Last accepted savepoint of each partition.
#[derive(Debug, Default)]
pub struct SavepointTracker {
    savepoints: HashMap<String, Version>,
}

impl SavepointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn savepoint(&self, partition: &str) -> Option<&Version> {
        self.savepoints.get(partition)
    }

    /// Decide whether `reported` may replace the partition's savepoint.
    pub fn evaluate(
        &self,
        partition: &str,
        reported: &Version,
        has_building_segment: bool,
    ) -> CheckpointDecision {
        let Some(accepted) = self.savepoints.get(partition) else {
            return CheckpointDecision::Accept;
        };

        let accepted_coord = accepted.coord();
        let reported_coord = reported.coord();
        let decision = if accepted_coord == reported_coord {
            CheckpointDecision::Unchanged
        } else if reported.version_id() < accepted.version_id() {
            CheckpointDecision::Stale {
                accepted: accepted_coord,
                reported: reported_coord,
            }
        } else if reported.can_fast_forward_from(&accepted_coord, has_building_segment) {
            CheckpointDecision::FastForward {
                from: accepted_coord,
                to: reported_coord,
            }
        } else {
            CheckpointDecision::Conflict {
                accepted: accepted_coord,
                reported: reported_coord,
            }
        };
        debug!("partition [{partition}]: checkpoint {decision}");
        decision
    }

    /// Evaluate a report and record it when accepted.
    pub fn accept(
        &mut self,
        partition: &str,
        reported: &Version,
        has_building_segment: bool,
    ) -> Result<CheckpointDecision> {
        if !reported.is_valid() {
            return Err(VersionError::invalid_argument(format!(
                "partition {partition} reported a version without a version id"
            )));
        }
        let decision = self.evaluate(partition, reported, has_building_segment);
        if decision.is_accepted() {
            if decision != CheckpointDecision::Unchanged {
                info!("partition [{partition}]: savepoint {decision}");
            }
            self.savepoints
                .insert(partition.to_string(), reported.clone());
        } else {
            warn!("partition [{partition}]: checkpoint rejected, {decision}");
        }
        Ok(decision)
    }

    /// Forget a partition, e.g. after it was moved to another coordinator.
    pub fn remove(&mut self, partition: &str) -> Option<Version> {
        self.savepoints.remove(partition)
    }
}
