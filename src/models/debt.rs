use serde::{Deserialize, Serialize};

/// Ordinal risk level. Ordering follows declaration order, so
/// `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Total mapping: any input string resolves to exactly one severity,
    /// unrecognized values fall back to `Low`.
    pub fn parse(raw: &str) -> Severity {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Open,
    InProgress,
    Resolved,
    WontFix,
}

impl DebtStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DebtStatus::Open => "open",
            DebtStatus::InProgress => "in_progress",
            DebtStatus::Resolved => "resolved",
            DebtStatus::WontFix => "wont_fix",
        }
    }
}

/// Optional backend-supplied context for a debt item. Informational only,
/// never required for correctness of the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebtMetadata {
    pub risk_flags: Vec<String>,
    pub smell_flags: Vec<String>,
    pub estimated_hours: Option<f64>,
    /// Composite debt score in [0, 1].
    pub debt_score: Option<f64>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One detected debt item, scoped to a single file and line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDebt {
    pub id: String,
    /// Absolute, OS-native path. The authoritative join key against editor
    /// documents.
    pub file_path: String,
    /// 1-based. May point past the current end of file if the file changed
    /// since the last analysis; renderers must guard.
    pub line: u32,
    pub severity: Severity,
    pub description: String,
    pub status: DebtStatus,
    pub metadata: Option<DebtMetadata>,
}
