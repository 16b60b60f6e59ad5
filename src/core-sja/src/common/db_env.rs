use data_model_sja::db::{ConnectionPoolError, DbPool, establish_connection_pool};

use crate::common::config::StoreConfig;

/// Pools for the accounting store and the results store. When both live in the
/// same database one pool serves both.
#[derive(Clone)]
pub struct StorePools {
    pub accounting: DbPool,
    pub results: DbPool,
}

/// Connects to the configured databases, failing if either cannot be reached.
pub async fn get_db_pools(config: &StoreConfig) -> Result<StorePools, ConnectionPoolError> {
    let accounting = establish_connection_pool(&config.accounting_url).await?;
    let results = if config.shares_database() {
        accounting.clone()
    } else {
        establish_connection_pool(&config.results_url).await?
    };
    Ok(StorePools { accounting, results })
}

/// Connects to the database holding the results table only.
pub async fn get_results_pool(config: &StoreConfig) -> Result<DbPool, ConnectionPoolError> {
    establish_connection_pool(&config.results_url).await
}
