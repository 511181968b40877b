use crate::index::FileDebtIndex;
use crate::models::{Document, FileDebt, Severity};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One decorated line with its hover text. `line` is 1-based, matching
/// [`FileDebt::line`].
#[derive(Debug, Clone, PartialEq)]
pub struct LineDecoration {
    pub line: u32,
    pub hover: String,
}

/// All decorated lines for one severity. The shell owns one decoration-type
/// handle per severity (background color and opacity) and applies each bucket
/// through it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityDecorations {
    pub severity: Severity,
    pub lines: Vec<LineDecoration>,
}

/// Renders per-line background highlights and hover text for the active
/// editor, grouped by severity.
pub struct InlineDebtDecorator {
    index: Arc<FileDebtIndex>,
    enabled: AtomicBool,
}

impl InlineDebtDecorator {
    pub fn new(index: Arc<FileDebtIndex>, enabled: bool) -> InlineDebtDecorator {
        InlineDebtDecorator {
            index,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Global toggle. When disabled the shell clears decorations from all
    /// visible editors immediately; the next refresh returns empty sets.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Scans the active editor's document (may perform I/O) and builds the
    /// decoration buckets, worst severity first. Debts pointing past the end
    /// of the document are skipped, not treated as a failure; the analysis is
    /// simply staler than the buffer.
    pub async fn refresh_active_editor(
        &self,
        document: &Document,
        force_scan: bool,
    ) -> Vec<SeverityDecorations> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let debts = self.index.scan_file(document, force_scan).await;
        build_decorations(&debts, document.line_count)
    }
}

fn build_decorations(debts: &[FileDebt], line_count: u32) -> Vec<SeverityDecorations> {
    let mut by_severity: BTreeMap<Severity, BTreeMap<u32, Vec<&FileDebt>>> = BTreeMap::new();
    for debt in debts {
        if debt.line > line_count {
            continue;
        }
        by_severity
            .entry(debt.severity)
            .or_default()
            .entry(debt.line)
            .or_default()
            .push(debt);
    }

    by_severity
        .into_iter()
        .rev()
        .map(|(severity, lines)| SeverityDecorations {
            severity,
            lines: lines
                .into_iter()
                .map(|(line, debts)| LineDecoration {
                    line,
                    hover: debts
                        .iter()
                        .map(|debt| hover_text(debt))
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                })
                .collect(),
        })
        .collect()
}

fn hover_text(debt: &FileDebt) -> String {
    let mut hover = format!("**{}** technical debt (line {})", debt.severity.label(), debt.line);

    if let Some(metadata) = &debt.metadata {
        if !metadata.risk_flags.is_empty() {
            hover.push_str(&format!("\nrisk: {}", metadata.risk_flags.join(", ")));
        }
        if !metadata.smell_flags.is_empty() {
            hover.push_str(&format!("\nsmells: {}", metadata.smell_flags.join(", ")));
        }
        if let Some(hours) = metadata.estimated_hours {
            hover.push_str(&format!("\nestimated effort: {hours}h"));
        }
    }

    if !debt.description.is_empty() {
        hover.push_str(&format!("\n\n{}", debt.description));
    }

    hover
}
