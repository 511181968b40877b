use crate::index::FileDebtIndex;
use crate::models::{DebtStatus, Document, FileDebt, Severity};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Command bound to a lens. The shell maps these to registered editor
/// commands; [`LensCommand::SetDebtStatus`] handlers call
/// `update_debt_status` and then trigger a forced rescan.
#[derive(Debug, Clone, PartialEq)]
pub enum LensCommand {
    ScanFile { path: String },
    SetDebtStatus { debt_id: String, status: DebtStatus },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeLens {
    /// 1-based line the lens is anchored above.
    pub line: u32,
    pub title: String,
    pub command: LensCommand,
}

/// Read-only consumer of the cache: producing lenses never triggers a fetch,
/// so a file opened for the first time shows a scan call-to-action until the
/// user or an auto-scan populates the cache.
pub struct DebtCodeLensProvider {
    index: Arc<FileDebtIndex>,
    refreshes: broadcast::Sender<()>,
}

impl DebtCodeLensProvider {
    pub fn new(index: Arc<FileDebtIndex>) -> DebtCodeLensProvider {
        let (refreshes, _) = broadcast::channel(16);
        DebtCodeLensProvider { index, refreshes }
    }

    /// The shell listens here and re-requests lenses from the host on every
    /// signal. Used after cache invalidation.
    pub fn subscribe_refresh(&self) -> broadcast::Receiver<()> {
        self.refreshes.subscribe()
    }

    pub fn refresh(&self) {
        let _ = self.refreshes.send(());
    }

    pub fn lenses_for(&self, document: &Document) -> Vec<CodeLens> {
        if !document.is_on_disk() {
            return Vec::new();
        }

        let debts = self.index.get_cached_file_debts(document);
        if debts.is_empty() {
            return vec![CodeLens {
                line: 1,
                title: "DebtView: no data (click to scan)".to_string(),
                command: LensCommand::ScanFile {
                    path: document.path.clone(),
                },
            }];
        }

        let mut lenses = vec![CodeLens {
            line: 1,
            title: summary_title(&debts),
            command: LensCommand::ScanFile {
                path: document.path.clone(),
            },
        }];

        for debt in &debts {
            // Stale analysis may point past the buffer; anchor on the last
            // line so the actions stay reachable.
            let line = debt.line.min(document.line_count.max(1));
            for (title, status) in [
                ("Mark in progress", DebtStatus::InProgress),
                ("Mark resolved", DebtStatus::Resolved),
                ("Ignore", DebtStatus::WontFix),
            ] {
                lenses.push(CodeLens {
                    line,
                    title: title.to_string(),
                    command: LensCommand::SetDebtStatus {
                        debt_id: debt.id.clone(),
                        status,
                    },
                });
            }
        }

        lenses
    }
}

fn summary_title(debts: &[FileDebt]) -> String {
    let count_of = |severity: Severity| debts.iter().filter(|d| d.severity == severity).count();

    let breakdown: Vec<String> = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ]
    .into_iter()
    .filter_map(|severity| {
        let count = count_of(severity);
        (count > 0).then(|| format!("{count} {}", severity.label()))
    })
    .collect();

    format!("DebtView: {} debt item(s) ({})", debts.len(), breakdown.join(", "))
}
