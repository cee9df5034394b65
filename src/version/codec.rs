//! JSON document encoding of versions.
//!
//! A version is persisted as one self-describing JSON object. Optional and
//! legacy keys are read into a transient [`VersionDocument`] that is
//! consulted once and discarded, so a decoded [`Version`] is always fully
//! populated:
//!
//! - no `format_version`: the oldest layout, migrated to the current one
//! - format older than 3: the locator is synthesized from `timestamp` and
//!   flagged legacy
//! - no `segment_schema_versions`: every segment gets the version's schema
//! - no `last_segmentid`: recomputed from the tail of the segment list
//! - a version line whose head is not this version: re-seeded
//!
//! Decoding either returns a complete version or an error; nothing is
//! applied halfway.

use std::collections::BTreeMap;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VersionError};
use crate::version::descriptor::Version;
use crate::version::line::VersionLine;
use crate::version::locator::Locator;
use crate::version::roadmap::SchemaVersionRoadmap;
use crate::version::segment::{SegmentInfo, SegmentLineage};
use crate::version::segment_descriptions::SegmentDescriptions;
use crate::version::task::{IndexTaskHistory, IndexTaskQueue};
use crate::version::{
    CURRENT_FORMAT_VERSION, DEFAULT_SCHEMA_ID, LEGACY_FORMAT_VERSION, LOCATOR_FORMAT_VERSION,
    SchemaId, SegmentId, VersionId,
};

/// Timestamp of a legacy document that recorded none.
pub const INVALID_TIMESTAMP: i64 = -1;

/// On-disk shape of a version document.
#[derive(Debug, Serialize, Deserialize)]
struct VersionDocument {
    versionid: VersionId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    format_version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<SchemaId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    read_schema_version: Option<SchemaId>,

    #[serde(default)]
    segments: Vec<SegmentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    segment_schema_versions: Option<Vec<SchemaId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_segmentid: Option<SegmentId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version_road_map: Option<Vec<SchemaId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    locator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    commit_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,

    #[serde(default)]
    sealed: bool,

    #[serde(default)]
    fence_name: String,

    #[serde(default)]
    description: BTreeMap<String, String>,

    #[serde(default)]
    version_line: VersionLine,

    #[serde(default)]
    index_task_history: IndexTaskHistory,

    #[serde(default, skip_serializing_if = "IndexTaskQueue::is_empty")]
    index_task_queue: IndexTaskQueue,

    #[serde(default, skip_serializing_if = "SegmentDescriptions::is_empty")]
    segment_descriptions: SegmentDescriptions,
}

/// Encode a version as a pretty-printed JSON document.
pub fn encode(version: &Version, hostname: &str) -> Result<String> {
    let segments = version.segments.segments();
    let document = VersionDocument {
        versionid: version.version_id,
        format_version: Some(version.format_version),
        schema_version: Some(version.schema_id),
        read_schema_version: Some(version.read_schema_id),
        segments: segments.iter().map(|info| info.segment_id).collect(),
        segment_schema_versions: Some(segments.iter().map(|info| info.schema_id).collect()),
        last_segmentid: Some(version.segments.last_segment_id()),
        schema_version_road_map: Some(version.roadmap.ids().to_vec()),
        locator: Some(version.locator.serialize()?),
        timestamp: None,
        commit_time: Some(version.commit_time),
        hostname: Some(hostname.to_string()),
        sealed: version.sealed,
        fence_name: version.fence_name.clone(),
        description: version.description.clone(),
        version_line: version.version_line.clone(),
        index_task_history: version.task_history.clone(),
        index_task_queue: version.task_queue.clone(),
        segment_descriptions: version.segment_descriptions.clone(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Decode a version document.
pub fn decode(text: &str) -> Result<Version> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| VersionError::decode(None, format!("malformed JSON: {e}"), text))?;
    let version_id_hint = value
        .get("versionid")
        .and_then(Value::as_i64)
        .and_then(|id| VersionId::try_from(id).ok());

    let document = VersionDocument::deserialize(&value).map_err(|e| {
        VersionError::decode(version_id_hint, format!("invalid document: {e}"), text)
    })?;

    from_document(document)
        .map_err(|reason| VersionError::decode(version_id_hint, reason, text))
}

/// Decode into an existing version, leaving it untouched on failure.
pub fn decode_into(target: &mut Version, text: &str) -> Result<()> {
    *target = decode(text)?;
    Ok(())
}

fn from_document(document: VersionDocument) -> std::result::Result<Version, String> {
    let version_id = document.versionid;
    let format_version = document.format_version.unwrap_or(LEGACY_FORMAT_VERSION);
    if format_version > CURRENT_FORMAT_VERSION {
        return Err(format!(
            "format version {format_version} is newer than supported {CURRENT_FORMAT_VERSION}"
        ));
    }

    let schema_id = document.schema_version.unwrap_or(DEFAULT_SCHEMA_ID);
    let mut version = Version::with_schema(version_id, schema_id);

    let segment_schemas = match document.segment_schema_versions {
        Some(schemas) if schemas.len() != document.segments.len() => {
            return Err(format!(
                "{} segments but {} segment schema versions",
                document.segments.len(),
                schemas.len()
            ));
        }
        Some(schemas) => schemas,
        None => vec![schema_id; document.segments.len()],
    };
    let infos = document
        .segments
        .iter()
        .zip(segment_schemas)
        .map(|(segment_id, schema)| SegmentInfo::new(*segment_id, schema))
        .collect();
    let (mut segments, repaired) = SegmentLineage::from_segments(infos);
    if repaired {
        warn!(
            "version [{version_id}]: segment ids {:?} not strictly increasing, sorted and deduplicated",
            document.segments
        );
    }
    if let Some(last_segment_id) = document.last_segmentid {
        if last_segment_id < segments.last_segment_id() {
            warn!(
                "version [{version_id}]: last_segmentid [{last_segment_id}] below largest segment [{}], raised",
                segments.last_segment_id()
            );
        }
        segments.set_last_segment_id(last_segment_id);
    }
    version.segments = segments;

    if format_version < LOCATOR_FORMAT_VERSION {
        let timestamp = document
            .timestamp
            .or(document.commit_time)
            .unwrap_or(INVALID_TIMESTAMP);
        debug!(
            "version [{version_id}]: migrating format [{format_version}] to [{CURRENT_FORMAT_VERSION}], legacy timestamp [{timestamp}]"
        );
        version.locator = Locator::from_legacy_timestamp(timestamp);
        version.commit_time = document.commit_time.unwrap_or(timestamp);
    } else {
        version.locator = match (&document.locator, document.timestamp) {
            (Some(hex), _) => Locator::deserialize(hex).map_err(|e| e.to_string())?,
            (None, Some(timestamp)) => Locator::from_legacy_timestamp(timestamp),
            (None, None) => Locator::default(),
        };
        version.commit_time = document.commit_time.unwrap_or(0);
    }
    version.format_version = CURRENT_FORMAT_VERSION;

    version.read_schema_id = schema_id;
    if let Some(read_schema_id) = document.read_schema_version {
        version.set_read_schema_id(read_schema_id);
    }

    version.roadmap =
        SchemaVersionRoadmap::from_ids(document.schema_version_road_map.unwrap_or_default());
    version.update_schema_version_roadmap();

    version.sealed = document.sealed;
    version.fence_name = document.fence_name;
    version.description = document.description;
    version.version_line = document.version_line;
    version.task_history = document.index_task_history;
    version.task_queue = document.index_task_queue;
    version.segment_descriptions = document.segment_descriptions;

    let head = version.version_line.head_version().version_id;
    if version.is_public() && !version.fence_name.is_empty() && head != version_id {
        warn!(
            "version [{version_id}]: version line head [{head}] disagrees, re-seeding with fence [{}]",
            version.fence_name
        );
        let coord = version.coord();
        version.version_line.add_current_version(coord);
    }

    Ok(version)
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(text: &str) -> Result<Self> {
        decode(text)
    }
}
