//! Application state wiring all services together.
//!
//! [`AppState`] holds the concrete service instances used by both the CLI
//! and the REST API. Core components are generic over store/resolver
//! traits; AppState pins them to the SQLite store and the directory-loaded
//! static resolver.

use std::path::PathBuf;
use std::sync::Arc;

use windlass_core::handler::HandlerRegistry;
use windlass_core::interpreter::StepInterpreter;
use windlass_core::resolver::StaticResolver;
use windlass_core::runner::ExecutionRunner;
use windlass_core::service::OrchestratorService;
use windlass_infra::config::load_config;
use windlass_infra::definitions::load_resolver;
use windlass_infra::handlers::http::HttpHandler;
use windlass_infra::sqlite::execution::SqliteExecutionStore;
use windlass_infra::sqlite::pool::StorePools;
use windlass_types::config::OrchestratorConfig;

/// Concrete service type pinned to the infra implementations.
pub type ConcreteService = OrchestratorService<SqliteExecutionStore, StaticResolver>;

/// Concrete runner type pinned to the infra implementations.
pub type ConcreteRunner = ExecutionRunner<SqliteExecutionStore, StaticResolver>;

/// Shared application state for CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConcreteService>,
    pub store: Arc<SqliteExecutionStore>,
    pub resolver: Arc<StaticResolver>,
    pub registry: Arc<HandlerRegistry>,
    pub config: OrchestratorConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize state: resolve the data directory, load config, open the
    /// database, load workflow definitions, and seed the handler registry
    /// (built-ins plus the reqwest-backed `http` handler).
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;

        let database_url = format!("sqlite://{}/windlass.db?mode=rwc", data_dir.display());
        let pool = StorePools::open(&database_url).await?;
        let store = Arc::new(SqliteExecutionStore::new(pool));

        let resolver = Arc::new(load_resolver(&data_dir.join("workflows")).await?);

        let registry = Arc::new(HandlerRegistry::with_builtins());
        registry.register(Arc::new(HttpHandler::new()));

        let service = Arc::new(OrchestratorService::new(
            store.clone(),
            resolver.clone(),
            config.claim.clone(),
        ));

        tracing::info!(
            data_dir = %data_dir.display(),
            workflows = resolver.len(),
            "application state initialized"
        );

        Ok(Self {
            service,
            store,
            resolver,
            registry,
            config,
            data_dir,
        })
    }

    /// Build an execution runner against this state's store and resolver.
    pub fn runner(&self) -> Arc<ConcreteRunner> {
        Arc::new(ExecutionRunner::new(
            self.store.clone(),
            self.resolver.clone(),
            StepInterpreter::new(self.registry.clone(), self.config.step.default_timeout_ms),
            self.config.retry.clone(),
        ))
    }
}

/// Data directory: `WINDLASS_DATA_DIR` env var, else `~/.windlass`.
fn resolve_data_dir() -> PathBuf {
    match std::env::var("WINDLASS_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".windlass")
        }
    }
}
