use anyhow::{anyhow, Result};
use async_trait::async_trait;
use debtview::gateway::{DebtGateway, DebtRecord};
use debtview::index::{DebtChange, FileDebtIndex};
use debtview::models::{DebtStatus, Document, NewProject, Project, Severity};
use debtview::settings::EffectiveSettings;
use debtview::views::{LensCommand, TreeNode, ViewMode};
use debtview::DebtContext;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeGateway {
    lookup_calls: AtomicUsize,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    project_fetch_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_fetches: AtomicBool,
    fail_updates: AtomicBool,
    fail_project_fetches: AtomicBool,
    file_records: Mutex<HashMap<String, Vec<DebtRecord>>>,
    project_records: Mutex<Vec<DebtRecord>>,
}

impl FakeGateway {
    fn set_file_records(&self, file_path: &str, records: Vec<DebtRecord>) {
        self.file_records
            .lock()
            .expect("file records lock")
            .insert(file_path.to_string(), records);
    }

    fn set_project_records(&self, records: Vec<DebtRecord>) {
        *self.project_records.lock().expect("project records lock") = records;
    }
}

#[async_trait]
impl DebtGateway for FakeGateway {
    async fn resolve_project_by_path(&self, _local_path: &str) -> Result<Option<Project>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn create_project(&self, spec: &NewProject) -> Result<Project> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        // Widen the race window for concurrent resolution tests.
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(Project {
            id: "p1".to_string(),
            name: spec.name.clone(),
            local_path: spec.local_path.clone(),
            language: spec.language.clone(),
        })
    }

    async fn fetch_file_debts(&self, _project_id: &str, file_path: &str) -> Result<Vec<DebtRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        Ok(self
            .file_records
            .lock()
            .expect("file records lock")
            .get(file_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_project_debts(&self, _project_id: &str) -> Result<Vec<DebtRecord>> {
        self.project_fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_project_fetches.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        Ok(self.project_records.lock().expect("project records lock").clone())
    }

    async fn update_debt_status(&self, debt_id: &str, status: DebtStatus) -> Result<DebtRecord> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        Ok(record(debt_id, Some("a.rs"), 1, "low", status.label()))
    }
}

fn record(id: &str, path: Option<&str>, line: i64, severity: &str, status: &str) -> DebtRecord {
    serde_json::from_value(json!({
        "id": id,
        "file_path": path,
        "line": line,
        "severity": severity,
        "message": "needs attention",
        "status": status,
    }))
    .expect("build record")
}

fn index_with_ttl(gateway: Arc<FakeGateway>, ttl: Duration) -> FileDebtIndex {
    FileDebtIndex::new(gateway, Some("/repo".to_string()), ttl)
}

fn context(gateway: Arc<FakeGateway>) -> DebtContext {
    DebtContext::new(
        Some("/repo".to_string()),
        &EffectiveSettings::default(),
        gateway,
    )
}

#[tokio::test]
async fn scans_within_ttl_window_perform_at_most_one_fetch() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_millis(100));
    let doc = Document::on_disk("/repo/a.rs", 50);

    let first = index.scan_file(&doc, false).await;
    let second = index.scan_file(&doc, false).await;
    assert_eq!(first.len(), 1);
    assert_eq!(second, first);
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    index.scan_file(&doc, false).await;
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn force_refresh_bypasses_a_fresh_cache() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_secs(300));
    let doc = Document::on_disk("/repo/a.rs", 50);

    index.scan_file(&doc, false).await;
    index.scan_file(&doc, true).await;
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cache_only_reads_never_invoke_the_gateway() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_millis(50));
    let doc = Document::on_disk("/repo/a.rs", 50);

    // Empty cache.
    assert!(index.get_cached_file_debts(&doc).is_empty());
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);

    // Fresh cache.
    index.scan_file(&doc, false).await;
    assert_eq!(index.get_cached_file_debts(&doc).len(), 1);

    // Expired cache: the entry is still served, never re-fetched here.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(index.get_cached_debts_by_path("/repo/a.rs").len(), 1);
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn virtual_documents_are_rejected_before_any_io() {
    let gateway = Arc::new(FakeGateway::default());
    let index = index_with_ttl(gateway.clone(), Duration::from_secs(300));
    let doc = Document {
        scheme: "output".to_string(),
        path: "extension-output".to_string(),
        line_count: 500,
    };

    assert!(index.scan_file(&doc, true).await.is_empty());
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.lookup_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn successful_status_update_invalidates_the_file_entry() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_secs(300));
    let doc = Document::on_disk("/repo/a.rs", 50);

    let debts = index.scan_file(&doc, false).await;
    assert_eq!(debts.len(), 1);

    let updated = index.update_debt_status(&debts[0], DebtStatus::Resolved).await;
    assert!(updated);
    assert!(index.get_cached_file_debts(&doc).is_empty());

    // The next scan repopulates from the backend.
    index.scan_file(&doc, false).await;
    assert_eq!(index.get_cached_file_debts(&doc).len(), 1);
}

#[tokio::test]
async fn failed_status_update_leaves_the_cache_untouched() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_secs(300));
    let doc = Document::on_disk("/repo/a.rs", 50);

    let debts = index.scan_file(&doc, false).await;
    gateway.fail_updates.store(true, Ordering::SeqCst);

    let updated = index.update_debt_status(&debts[0], DebtStatus::Resolved).await;
    assert!(!updated);
    assert_eq!(index.get_cached_file_debts(&doc).len(), 1);
}

#[tokio::test]
async fn failed_fetch_drops_the_entry_instead_of_poisoning_it() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_secs(300));
    let doc = Document::on_disk("/repo/a.rs", 50);
    let mut changes = index.subscribe();

    index.scan_file(&doc, false).await;
    assert_eq!(index.get_cached_file_debts(&doc).len(), 1);
    changes.try_recv().expect("populate event");

    gateway.fail_fetches.store(true, Ordering::SeqCst);
    let result = index.scan_file(&doc, true).await;
    assert!(result.is_empty());
    assert!(index.get_cached_file_debts(&doc).is_empty());
    // Views still get notified so they clear instead of showing stale data.
    changes.try_recv().expect("invalidate event");

    gateway.fail_fetches.store(false, Ordering::SeqCst);
    index.scan_file(&doc, false).await;
    assert_eq!(index.get_cached_file_debts(&doc).len(), 1);
}

#[tokio::test]
async fn aggregate_is_bound_to_scanned_files_and_sorted() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records(
        "/repo/b.rs",
        vec![record("d3", None, 20, "low", "open"), record("d2", None, 4, "high", "open")],
    );
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 9, "medium", "open")]);
    gateway.set_file_records("/repo/never.rs", vec![record("d9", None, 1, "critical", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_secs(300));

    index.scan_file(&Document::on_disk("/repo/b.rs", 100), false).await;
    index.scan_file(&Document::on_disk("/repo/a.rs", 100), false).await;

    let all = index.aggregate_workspace_debts();
    let keys: Vec<(String, u32)> = all.iter().map(|d| (d.file_path.clone(), d.line)).collect();
    assert_eq!(
        keys,
        vec![
            ("/repo/a.rs".to_string(), 9),
            ("/repo/b.rs".to_string(), 4),
            ("/repo/b.rs".to_string(), 20),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_project_resolution_creates_exactly_once() {
    let gateway = Arc::new(FakeGateway::default());
    let index = Arc::new(index_with_ttl(gateway.clone(), Duration::from_secs(300)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let index = index.clone();
        handles.push(tokio::spawn(async move { index.ensure_project().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("join"), Some("p1".to_string()));
    }

    assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.lookup_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_workspace_degrades_to_empty_results() {
    let gateway = Arc::new(FakeGateway::default());
    let index = FileDebtIndex::new(gateway.clone(), None, Duration::from_secs(300));
    let doc = Document::on_disk("/repo/a.rs", 50);

    assert_eq!(index.ensure_project().await, None);
    assert!(index.scan_file(&doc, false).await.is_empty());
    assert_eq!(gateway.lookup_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_all_only_refetches_expired_entries_unless_forced() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_millis(100));
    let doc = Document::on_disk("/repo/a.rs", 50);

    index.scan_file(&doc, false).await;
    index.refresh_all_cached(false).await;
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    index.refresh_all_cached(false).await;
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 2);

    index.refresh_all_cached(true).await;
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn auto_refresh_task_refetches_expired_entries() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = Arc::new(index_with_ttl(gateway.clone(), Duration::from_millis(20)));
    let doc = Document::on_disk("/repo/a.rs", 50);

    index.scan_file(&doc, false).await;
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);

    let task = debtview::index::spawn_auto_refresh(index.clone(), Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(180)).await;
    task.abort();

    assert!(gateway.fetch_calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn change_events_fire_on_populate_invalidate_and_clear() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let index = index_with_ttl(gateway.clone(), Duration::from_secs(300));
    let doc = Document::on_disk("/repo/a.rs", 50);
    let mut changes = index.subscribe();

    let debts = index.scan_file(&doc, false).await;
    assert!(matches!(changes.try_recv(), Ok(DebtChange::File(_))));

    index.update_debt_status(&debts[0], DebtStatus::InProgress).await;
    assert!(matches!(changes.try_recv(), Ok(DebtChange::File(_))));

    index.clear();
    assert!(matches!(changes.try_recv(), Ok(DebtChange::All)));
}

#[tokio::test]
async fn disabled_decorator_renders_nothing_and_skips_the_scan() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let ctx = context(gateway.clone());
    let doc = Document::on_disk("/repo/a.rs", 50);

    ctx.decorator.set_enabled(false);
    assert!(ctx.decorator.refresh_active_editor(&doc, true).await.is_empty());
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);

    ctx.decorator.set_enabled(true);
    let sets = ctx.decorator.refresh_active_editor(&doc, false).await;
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].severity, Severity::High);
}

#[tokio::test]
async fn lens_provider_reads_only_the_cache() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let ctx = context(gateway.clone());
    let doc = Document::on_disk("/repo/a.rs", 50);

    // Cold cache: a single scan call-to-action, no fetch.
    let cold = ctx.code_lens.lenses_for(&doc);
    assert_eq!(cold.len(), 1);
    assert!(cold[0].title.contains("click to scan"));
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);

    ctx.index.scan_file(&doc, false).await;
    let warm = ctx.code_lens.lenses_for(&doc);
    // Summary lens plus three action lenses per debt.
    assert_eq!(warm.len(), 4);
    assert!(warm[0].title.contains("1 high"));
    assert!(matches!(
        warm[1].command,
        LensCommand::SetDebtStatus { status: DebtStatus::InProgress, .. }
    ));
    assert!(matches!(
        warm[3].command,
        LensCommand::SetDebtStatus { status: DebtStatus::WontFix, .. }
    ));
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tree_file_mode_lists_open_documents_with_cached_counts() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_file_records("/repo/a.rs", vec![record("d1", None, 10, "high", "open")]);
    let ctx = context(gateway.clone());

    assert_eq!(ctx.tree.view_mode(), ViewMode::File);
    let items = ctx
        .tree
        .root_items(&[Document::on_disk("/repo/a.rs", 50)])
        .await;

    assert!(matches!(items[0], TreeNode::SwitchMode { target: ViewMode::Workspace }));
    match &items[1] {
        TreeNode::File(summary) => {
            assert_eq!(summary.debt_count, 1);
            assert_eq!(summary.worst_severity, Some(Severity::High));
            let children = ctx.tree.file_children(summary);
            assert!(matches!(&children[0], TreeNode::Debt { reveal, .. } if reveal.line == 10));
        }
        other => panic!("expected file node, got {other:?}"),
    }
}

#[tokio::test]
async fn tree_workspace_mode_groups_by_file_and_sorts_by_worst_severity() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.set_project_records(vec![
        record("d1", Some("src/low.rs"), 3, "low", "open"),
        record("d2", Some("src/bad.rs"), 7, "critical", "open"),
        record("d3", Some("src/bad.rs"), 2, "medium", "open"),
    ]);
    let ctx = context(gateway.clone());

    assert_eq!(ctx.tree.switch_view_mode(), ViewMode::Workspace);
    let items = ctx.tree.root_items(&[]).await;

    assert!(matches!(items[0], TreeNode::SwitchMode { target: ViewMode::File }));
    let files: Vec<_> = items
        .iter()
        .filter_map(|node| match node {
            TreeNode::File(summary) => Some(summary),
            _ => None,
        })
        .collect();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].path, "/repo/src/bad.rs");
    assert_eq!(files[0].debt_count, 2);
    assert_eq!(files[0].worst_severity, Some(Severity::Critical));
    assert_eq!(files[1].path, "/repo/src/low.rs");

    // The aggregate went straight to the backend, not through the file cache.
    assert_eq!(gateway.project_fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tree_renders_an_info_leaf_on_backend_failure() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.fail_project_fetches.store(true, Ordering::SeqCst);
    let ctx = context(gateway.clone());

    ctx.tree.switch_view_mode();
    let items = ctx.tree.root_items(&[]).await;
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[1], TreeNode::Info(message) if message.contains("Failed")));

    // Empty open-file list in FILE mode also degrades to an info leaf.
    ctx.tree.switch_view_mode();
    let items = ctx.tree.root_items(&[]).await;
    assert!(matches!(&items[1], TreeNode::Info(_)));
}
