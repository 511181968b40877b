use crate::gateway::{normalize_record, DebtGateway};
use crate::index::paths::normalize_path_key;
use crate::index::FileDebtIndex;
use crate::models::{Document, FileDebt, Severity};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// The tree's two rendering modes. [`TechnicalDebtProvider::switch_view_mode`]
/// is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// One item per currently open document, from the cache (with an eager
    /// first-time fetch per document).
    File,
    /// Project-wide aggregate straight from the backend, bypassing the
    /// file-scan cache.
    Workspace,
}

impl ViewMode {
    pub fn other(self) -> ViewMode {
        match self {
            ViewMode::File => ViewMode::Workspace,
            ViewMode::Workspace => ViewMode::File,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::File => "Open files",
            ViewMode::Workspace => "Whole workspace",
        }
    }
}

/// Where "reveal in editor" should land: the shell opens the file and places
/// the cursor on the (1-based) line.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealTarget {
    pub path: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub path: String,
    pub name: String,
    pub debt_count: usize,
    pub worst_severity: Option<Severity>,
    pub debts: Vec<FileDebt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    /// Affordance that toggles to the other mode when activated.
    SwitchMode { target: ViewMode },
    File(FileSummary),
    Debt { debt: FileDebt, reveal: RevealTarget },
    /// Informational leaf; rendered instead of propagating any failure into
    /// the tree.
    Info(String),
}

pub struct TechnicalDebtProvider {
    index: Arc<FileDebtIndex>,
    gateway: Arc<dyn DebtGateway>,
    mode: Mutex<ViewMode>,
    max_files: usize,
}

impl TechnicalDebtProvider {
    pub fn new(
        index: Arc<FileDebtIndex>,
        gateway: Arc<dyn DebtGateway>,
        max_files: usize,
    ) -> TechnicalDebtProvider {
        TechnicalDebtProvider {
            index,
            gateway,
            mode: Mutex::new(ViewMode::File),
            max_files,
        }
    }

    pub fn view_mode(&self) -> ViewMode {
        self.mode.lock().map(|mode| *mode).unwrap_or(ViewMode::File)
    }

    /// Toggles between the two modes and returns the new one.
    pub fn switch_view_mode(&self) -> ViewMode {
        let mut mode = match self.mode.lock() {
            Ok(mode) => mode,
            Err(_) => return ViewMode::File,
        };
        *mode = mode.other();
        *mode
    }

    /// Builds the root of the tree: the mode-switch affordance followed by
    /// the current mode's items. Never fails; fetch problems render as a
    /// single [`TreeNode::Info`] leaf.
    pub async fn root_items(&self, open_documents: &[Document]) -> Vec<TreeNode> {
        let mode = self.view_mode();
        let mut items = vec![TreeNode::SwitchMode { target: mode.other() }];

        match mode {
            ViewMode::File => items.extend(self.open_file_items(open_documents).await),
            ViewMode::Workspace => items.extend(self.workspace_items().await),
        }

        items
    }

    /// Children of a file node: its debts, sorted by line, each with a reveal
    /// target.
    pub fn file_children(&self, file: &FileSummary) -> Vec<TreeNode> {
        let mut debts = file.debts.clone();
        debts.sort_by_key(|debt| debt.line);
        debts
            .into_iter()
            .map(|debt| {
                let reveal = RevealTarget {
                    path: debt.file_path.clone(),
                    line: debt.line,
                };
                TreeNode::Debt { debt, reveal }
            })
            .collect()
    }

    async fn open_file_items(&self, open_documents: &[Document]) -> Vec<TreeNode> {
        let mut items = Vec::new();
        for document in open_documents.iter().filter(|doc| doc.is_on_disk()) {
            // Not a pure cache read on purpose: a newly opened file should
            // populate the cache eagerly.
            let debts = self.index.scan_file(document, false).await;
            items.push(TreeNode::File(summarize(document.path.clone(), debts)));
        }

        if items.is_empty() {
            items.push(TreeNode::Info("No open files".to_string()));
        }
        items
    }

    async fn workspace_items(&self) -> Vec<TreeNode> {
        let Some(project_id) = self.index.ensure_project().await else {
            return vec![TreeNode::Info("Failed to load technical debt".to_string())];
        };

        let records = match self.gateway.fetch_project_debts(&project_id).await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("project debts fetch failed: {e:#}");
                return vec![TreeNode::Info("Failed to load technical debt".to_string())];
            }
        };

        let root = self.index.workspace_root().unwrap_or_default().to_string();
        let mut groups: BTreeMap<String, Vec<FileDebt>> = BTreeMap::new();
        for debt in records
            .iter()
            .filter_map(|record| normalize_record(record, &root, None))
        {
            groups
                .entry(normalize_path_key(&debt.file_path))
                .or_default()
                .push(debt);
        }

        if groups.is_empty() {
            return vec![TreeNode::Info("No debt items found".to_string())];
        }

        let mut summaries: Vec<FileSummary> = groups
            .into_values()
            .map(|debts| summarize(debts[0].file_path.clone(), debts))
            .collect();
        summaries.sort_by(|a, b| {
            b.worst_severity
                .cmp(&a.worst_severity)
                .then_with(|| a.path.cmp(&b.path))
        });
        summaries.truncate(self.max_files);

        summaries.into_iter().map(TreeNode::File).collect()
    }
}

fn summarize(path: String, debts: Vec<FileDebt>) -> FileSummary {
    let name = Path::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.clone());

    FileSummary {
        name,
        debt_count: debts.len(),
        worst_severity: debts.iter().map(|debt| debt.severity).max(),
        debts,
        path,
    }
}
