//! Output formatting for CLI commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::error::Result;
use crate::version::SegmentInfo;

/// One line of `list` output.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version_id: i32,
    pub schema_id: u32,
    pub segment_count: usize,
    pub last_segment_id: i32,
    pub fence_name: String,
    pub sealed: bool,
    pub commit_time: i64,
}

/// Result of `list`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionListResult {
    pub directory: String,
    pub versions: Vec<VersionSummary>,
    pub corrupt: Vec<i32>,
}

/// Result of `show`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionDetail {
    pub version_id: i32,
    pub format_version: u32,
    pub schema_id: u32,
    pub read_schema_id: u32,
    pub schema_version_roadmap: Vec<u32>,
    pub segments: Vec<SegmentInfo>,
    pub last_segment_id: i32,
    pub fence_name: String,
    pub sealed: bool,
    pub commit_time: i64,
    pub locator: String,
    pub version_line: String,
    pub description: BTreeMap<String, String>,
}

/// Problems found in one version document.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionIssue {
    pub version_id: i32,
    pub issue: String,
}

/// Result of `validate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    pub directory: String,
    pub versions_checked: usize,
    pub corrupt: Vec<VersionIssue>,
    pub warnings: Vec<VersionIssue>,
}

/// Result of `fast-forward`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FastForwardResult {
    pub from: String,
    pub to: String,
    pub has_building_segment: bool,
    pub can_fast_forward: bool,
    pub version_line: String,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &VersionArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &VersionArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                println!("{key}: {}", format_value(&val));
            }
        }
        other => println!("{}", format_value(&other)),
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &VersionArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for human display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) if items.iter().all(|v| !v.is_object()) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| format!("\n  {}", format_value(item)))
            .collect::<String>(),
        serde_json::Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| format!("{k}={}", format_value(v)))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
