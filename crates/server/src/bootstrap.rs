use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use orderly_agent::{InMemorySessionStore, OrderAgent};
use orderly_core::config::{AppConfig, ConfigError, LoadOptions};
use orderly_core::domain::catalog::{Catalog, CatalogError};
use orderly_core::flows::engine::OrderFlow;
use orderly_core::reply::Renderer;
use orderly_db::{connect_with_settings, migrations, DbPool, SqlOrderLedger};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent: Arc<OrderAgent>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog load failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let catalog = Catalog::load(&config.catalog.path)?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        path = %config.catalog.path.display(),
        products = catalog.products().len(),
        "product catalog loaded"
    );

    let renderer =
        Renderer::new(config.catalog.currency.clone(), config.catalog.menu_image_url.clone());
    let ledger = Arc::new(SqlOrderLedger::new(
        db_pool.clone(),
        Duration::from_secs(config.database.timeout_secs),
    ));
    let agent = Arc::new(OrderAgent::new(
        OrderFlow::new(catalog, renderer),
        Arc::new(InMemorySessionStore::default()),
        ledger,
        config.order.environment_tag.clone(),
    ));

    Ok(Application { config, db_pool, agent })
}
