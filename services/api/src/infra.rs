use crate::cli::DatabaseArgs;
use hsearch::config::AppConfig;
use hsearch::error::AppError;
use hsearch::offers::SqliteOfferStore;
use hsearch::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) store: SqliteOfferStore,
}

/// Loads configuration, applies the database override and starts logging.
pub(crate) fn bootstrap(database: DatabaseArgs) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load()?;
    if let Some(url) = database.database_url {
        config.database.url = url;
    }

    telemetry::init(&config.telemetry, config.environment)?;
    Ok(config)
}

/// Connects to the configured database and makes sure the offer tables exist.
pub(crate) async fn open_store(config: &AppConfig) -> Result<SqliteOfferStore, AppError> {
    let store = SqliteOfferStore::connect(&config.database).await?;
    store.initialize_schema().await?;
    Ok(store)
}
