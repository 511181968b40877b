pub mod http;

use crate::models::{DebtMetadata, DebtStatus, FileDebt, NewProject, Project, Severity};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub use http::HttpDebtGateway;

/// Raw debt record as the backend ships it. Field names vary between
/// snake_case and camelCase across backend versions, and the line number may
/// live at the top level or inside the metadata bag, so everything except the
/// id is optional here and resolved in [`normalize_record`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "filePath")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, alias = "description")]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// The sole translation point between the UI status vocabulary and the wire
/// vocabulary. The backend calls `wont_fix` "ignored".
pub fn status_to_wire(status: DebtStatus) -> &'static str {
    match status {
        DebtStatus::Open => "open",
        DebtStatus::InProgress => "in_progress",
        DebtStatus::Resolved => "resolved",
        DebtStatus::WontFix => "ignored",
    }
}

pub fn status_from_wire(raw: &str) -> DebtStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "in_progress" | "in-progress" | "inprogress" => DebtStatus::InProgress,
        "resolved" | "fixed" | "closed" => DebtStatus::Resolved,
        "ignored" | "wont_fix" | "wontfix" => DebtStatus::WontFix,
        _ => DebtStatus::Open,
    }
}

/// Translates one wire record into the canonical [`FileDebt`]. Records
/// without an id are dropped. Relative backend paths are resolved against the
/// workspace root; records with no usable path fall back to `fallback_path`
/// (the scanned document, when fetching per file).
pub fn normalize_record(
    record: &DebtRecord,
    workspace_root: &str,
    fallback_path: Option<&str>,
) -> Option<FileDebt> {
    let id = record.id.as_deref()?.trim();
    if id.is_empty() {
        return None;
    }

    let raw_path = record
        .file_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .or(fallback_path)?;
    let file_path = resolve_path(raw_path, workspace_root);

    let line = record
        .line
        .or_else(|| metadata_location_line(record.metadata.as_ref()))
        .or_else(|| metadata_line(record.metadata.as_ref()))
        .unwrap_or(1)
        .max(1) as u32;

    Some(FileDebt {
        id: id.to_string(),
        file_path,
        line,
        severity: Severity::parse(record.severity.as_deref().unwrap_or("")),
        description: record.message.clone().unwrap_or_default(),
        status: status_from_wire(record.status.as_deref().unwrap_or("open")),
        metadata: parse_metadata(record.metadata.as_ref()),
    })
}

fn resolve_path(raw: &str, workspace_root: &str) -> String {
    if Path::new(raw).is_absolute() {
        raw.to_string()
    } else {
        Path::new(workspace_root).join(raw).to_string_lossy().to_string()
    }
}

fn metadata_location_line(metadata: Option<&Value>) -> Option<i64> {
    metadata?.get("location")?.get("line")?.as_i64()
}

fn metadata_line(metadata: Option<&Value>) -> Option<i64> {
    metadata?.get("line")?.as_i64()
}

fn parse_metadata(metadata: Option<&Value>) -> Option<DebtMetadata> {
    let obj = metadata?.as_object()?;

    let string_list = |keys: &[&str]| -> Vec<String> {
        keys.iter()
            .find_map(|k| obj.get(*k))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    let number = |keys: &[&str]| -> Option<f64> {
        keys.iter().find_map(|k| obj.get(*k)).and_then(Value::as_f64)
    };

    let parsed = DebtMetadata {
        risk_flags: string_list(&["risk_flags", "riskFlags"]),
        smell_flags: string_list(&["smell_flags", "smellFlags", "code_smells"]),
        estimated_hours: number(&["estimated_hours", "estimatedHours", "estimated_effort_hours"]),
        debt_score: number(&["debt_score", "debtScore", "score"]).map(|s| s.clamp(0.0, 1.0)),
        updated_at: obj
            .get("updated_at")
            .or_else(|| obj.get("updatedAt"))
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok()),
    };

    if parsed == DebtMetadata::default() {
        None
    } else {
        Some(parsed)
    }
}

/// Boundary to the external analysis backend. Implementations own the
/// request/response mapping and nothing else; retries and caching live with
/// the callers.
#[async_trait]
pub trait DebtGateway: Send + Sync {
    async fn resolve_project_by_path(&self, local_path: &str) -> Result<Option<Project>>;
    async fn create_project(&self, spec: &NewProject) -> Result<Project>;
    async fn fetch_file_debts(&self, project_id: &str, file_path: &str) -> Result<Vec<DebtRecord>>;
    async fn fetch_project_debts(&self, project_id: &str) -> Result<Vec<DebtRecord>>;
    async fn update_debt_status(&self, debt_id: &str, status: DebtStatus) -> Result<DebtRecord>;
}
