pub mod paths;

use crate::gateway::{normalize_record, DebtGateway};
use crate::models::{DebtStatus, Document, FileDebt, NewProject};
use paths::normalize_path_key;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Change notification fired after every cache mutation. All view components
/// subscribe to this single stream instead of polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebtChange {
    /// The entry for one normalized path key was populated or invalidated.
    File(String),
    /// The whole cache was cleared.
    All,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    debts: Vec<FileDebt>,
    fetched_at: Instant,
    /// Original OS-native path, kept so refresh cycles can re-fetch without
    /// undoing the key normalization.
    file_path: String,
}

/// In-memory TTL cache of `{file path -> debt list}` and the only component
/// allowed to talk to the gateway. Only [`scan_file`](Self::scan_file) and
/// [`refresh_all_cached`](Self::refresh_all_cached) perform network I/O;
/// every other read is cache-only, which bounds backend request volume to
/// once per file per TTL window plus explicit user actions.
pub struct FileDebtIndex {
    gateway: Arc<dyn DebtGateway>,
    workspace_root: Option<String>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
    // Memoized implicit project; the tokio mutex coalesces concurrent
    // resolution so the backend never sees two creates for one root.
    project: tokio::sync::Mutex<Option<crate::models::Project>>,
    changes: broadcast::Sender<DebtChange>,
    refresh_running: AtomicBool,
}

impl FileDebtIndex {
    pub fn new(
        gateway: Arc<dyn DebtGateway>,
        workspace_root: Option<String>,
        ttl: Duration,
    ) -> FileDebtIndex {
        let (changes, _) = broadcast::channel(64);
        FileDebtIndex {
            gateway,
            workspace_root,
            ttl,
            cache: Mutex::new(HashMap::new()),
            project: tokio::sync::Mutex::new(None),
            changes,
            refresh_running: AtomicBool::new(false),
        }
    }

    pub fn workspace_root(&self) -> Option<&str> {
        self.workspace_root.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DebtChange> {
        self.changes.subscribe()
    }

    /// Resolves the single workspace-root project, creating it on first sight.
    /// Returns `None` when no workspace is open or the backend is unreachable;
    /// callers treat that as "no debt data available", not as an error.
    /// Failures are not memoized, so the next call retries.
    pub async fn ensure_project(&self) -> Option<String> {
        let mut memo = self.project.lock().await;
        if let Some(project) = memo.as_ref() {
            return Some(project.id.clone());
        }

        let Some(root) = self.workspace_root.as_deref() else {
            log::warn!("no workspace open, debt data unavailable");
            return None;
        };

        let resolved = match self.gateway.resolve_project_by_path(root).await {
            Ok(found) => found,
            Err(e) => {
                log::warn!("project lookup failed for {root}: {e:#}");
                return None;
            }
        };

        let project = match resolved {
            Some(project) => project,
            None => match self.gateway.create_project(&NewProject::for_workspace(root)).await {
                Ok(project) => project,
                Err(e) => {
                    log::warn!("project create failed for {root}: {e:#}");
                    return None;
                }
            },
        };

        let id = project.id.clone();
        *memo = Some(project);
        Some(id)
    }

    /// Returns the debts for an on-disk document, fetching from the backend
    /// when the cache entry is missing, expired, or `force_refresh` is set.
    /// Virtual documents are rejected before any I/O. On fetch failure the
    /// entry is dropped (never left stale-but-fresh), the change event still
    /// fires, and the result is empty.
    pub async fn scan_file(&self, document: &Document, force_refresh: bool) -> Vec<FileDebt> {
        if !document.is_on_disk() {
            return Vec::new();
        }

        let key = normalize_path_key(&document.path);
        if !force_refresh {
            if let Some(fresh) = self.fresh_cached(&key) {
                log::debug!("cache hit for {key}");
                return fresh;
            }
        }

        self.fetch_into_cache(&key, &document.path).await
    }

    /// Pure cache read; never triggers I/O. Expired entries are still
    /// returned, they are simply due for a re-fetch on the next scan.
    pub fn get_cached_file_debts(&self, document: &Document) -> Vec<FileDebt> {
        if !document.is_on_disk() {
            return Vec::new();
        }
        self.get_cached_debts_by_path(&document.path)
    }

    /// Pure cache read; `[]` on miss.
    pub fn get_cached_debts_by_path(&self, path: &str) -> Vec<FileDebt> {
        let key = normalize_path_key(path);
        let Ok(cache) = self.cache.lock() else {
            return Vec::new();
        };
        cache.get(&key).map(|entry| entry.debts.clone()).unwrap_or_default()
    }

    /// Persists a status change through the gateway. On success the cache
    /// entry for the debt's file is invalidated so the next access re-reads
    /// the backend's authoritative state; callers trigger a rescan after a
    /// `true` result. On failure the cache is left untouched.
    pub async fn update_debt_status(&self, debt: &FileDebt, new_status: DebtStatus) -> bool {
        match self.gateway.update_debt_status(&debt.id, new_status).await {
            Ok(_) => {
                let key = normalize_path_key(&debt.file_path);
                if let Ok(mut cache) = self.cache.lock() {
                    cache.remove(&key);
                }
                self.notify(DebtChange::File(key));
                true
            }
            Err(e) => {
                log::warn!("status update failed for debt {}: {e:#}", debt.id);
                false
            }
        }
    }

    /// Union of all currently cached debts, sorted by `(file_path, line)`.
    /// A view over already-scanned files only; it never scans the workspace.
    pub fn aggregate_workspace_debts(&self) -> Vec<FileDebt> {
        let Ok(cache) = self.cache.lock() else {
            return Vec::new();
        };
        let mut all: Vec<FileDebt> = cache
            .values()
            .flat_map(|entry| entry.debts.iter().cloned())
            .collect();
        drop(cache);
        all.sort_by(|a, b| a.file_path.cmp(&b.file_path).then(a.line.cmp(&b.line)));
        all
    }

    /// Re-fetches every cached file that is TTL-expired (or all of them when
    /// `force_rescan` is set). A running flag skips the call entirely if a
    /// previous cycle is still in flight, so overlapping timers cannot pile
    /// up refresh cycles.
    pub async fn refresh_all_cached(&self, force_rescan: bool) {
        if self
            .refresh_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("refresh cycle already running, skipping this tick");
            return;
        }

        let due: Vec<(String, String)> = match self.cache.lock() {
            Ok(cache) => cache
                .iter()
                .filter(|(_, entry)| force_rescan || entry.fetched_at.elapsed() >= self.ttl)
                .map(|(key, entry)| (key.clone(), entry.file_path.clone()))
                .collect(),
            Err(_) => Vec::new(),
        };

        log::debug!("refreshing {} cached file(s)", due.len());
        for (key, path) in due {
            self.fetch_into_cache(&key, &path).await;
        }

        self.refresh_running.store(false, Ordering::SeqCst);
    }

    /// Drops every cache entry and notifies subscribers.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        self.notify(DebtChange::All);
    }

    fn fresh_cached(&self, key: &str) -> Option<Vec<FileDebt>> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.debts.clone())
    }

    async fn fetch_into_cache(&self, key: &str, file_path: &str) -> Vec<FileDebt> {
        let Some(project_id) = self.ensure_project().await else {
            return Vec::new();
        };
        let root = self.workspace_root.clone().unwrap_or_default();

        match self.gateway.fetch_file_debts(&project_id, file_path).await {
            Ok(records) => {
                let mut debts: Vec<FileDebt> = records
                    .iter()
                    .filter_map(|record| normalize_record(record, &root, Some(file_path)))
                    .collect();
                debts.sort_by_key(|debt| debt.line);

                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(
                        key.to_string(),
                        CacheEntry {
                            debts: debts.clone(),
                            fetched_at: Instant::now(),
                            file_path: file_path.to_string(),
                        },
                    );
                }
                self.notify(DebtChange::File(key.to_string()));
                debts
            }
            Err(e) => {
                log::warn!("debt fetch failed for {file_path}: {e:#}");
                if let Ok(mut cache) = self.cache.lock() {
                    cache.remove(key);
                }
                self.notify(DebtChange::File(key.to_string()));
                Vec::new()
            }
        }
    }

    fn notify(&self, change: DebtChange) {
        // Send only fails when nobody is subscribed, which is fine.
        let _ = self.changes.send(change);
    }
}

/// Runs `refresh_all_cached(false)` on a fixed interval. The index's own
/// running flag keeps a slow backend from stacking cycles.
pub fn spawn_auto_refresh(index: Arc<FileDebtIndex>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so the cycle starts
        // one full interval after activation.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            index.refresh_all_cached(false).await;
        }
    })
}
