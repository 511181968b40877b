pub mod gateway;
pub mod index;
pub mod models;
pub mod settings;
pub mod views;

use gateway::{DebtGateway, HttpDebtGateway};
use index::FileDebtIndex;
use settings::EffectiveSettings;
use std::sync::Arc;
use std::time::Duration;
use views::{DebtCodeLensProvider, InlineDebtDecorator, TechnicalDebtProvider};

/// One-time logging setup for embedding shells that bring no logger of their
/// own. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Everything the embedding shell needs, constructed once at activation and
/// passed by reference to command handlers. The index is the single shared
/// cache; each view component holds it by `Arc`, so there is no global
/// mutable state.
pub struct DebtContext {
    pub index: Arc<FileDebtIndex>,
    pub decorator: InlineDebtDecorator,
    pub code_lens: DebtCodeLensProvider,
    pub tree: TechnicalDebtProvider,
    auto_refresh: Duration,
}

impl DebtContext {
    pub fn new(
        workspace_root: Option<String>,
        settings: &EffectiveSettings,
        gateway: Arc<dyn DebtGateway>,
    ) -> DebtContext {
        let index = Arc::new(FileDebtIndex::new(
            gateway.clone(),
            workspace_root,
            settings.cache_ttl,
        ));

        DebtContext {
            decorator: InlineDebtDecorator::new(index.clone(), settings.inline_decorations),
            code_lens: DebtCodeLensProvider::new(index.clone()),
            tree: TechnicalDebtProvider::new(index.clone(), gateway, settings.max_tree_files),
            auto_refresh: settings.auto_refresh,
            index,
        }
    }

    /// Wires the context against the real HTTP backend described by the
    /// settings.
    pub fn with_http_backend(
        workspace_root: Option<String>,
        settings: &EffectiveSettings,
    ) -> anyhow::Result<DebtContext> {
        let gateway = HttpDebtGateway::new(&settings.api_base_url, settings.request_timeout)?;
        Ok(DebtContext::new(workspace_root, settings, Arc::new(gateway)))
    }

    /// Starts the periodic background refresh unless disabled in settings.
    /// Must be called from within a tokio runtime.
    pub fn start_auto_refresh(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self.auto_refresh.is_zero() {
            return None;
        }
        Some(index::spawn_auto_refresh(self.index.clone(), self.auto_refresh))
    }
}
