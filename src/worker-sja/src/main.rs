use core_sja::{
    RepairPolicy, ScriptAnalyzer,
    common::{LlmConfig, StoreConfig, db_env::get_db_pools, setup_logging},
};
use data_model_sja::{accounting::AccountingStore, results::ResultStore};

use worker_sja::{BatchReport, Error, run_batch};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file., if it exists
    dotenvy::dotenv().ok();

    setup_logging("worker_sja=debug,core_sja=info,data_model_sja=info");

    match run().await {
        Ok(report) => {
            if report.failed > 0 {
                tracing::warn!("{} jobs failed without a record and will be retried next run", report.failed);
            }
        }
        Err(error) => {
            tracing::error!("Batch aborted: {}", error);
            std::process::exit(1);
        }
    }
}

/// One pass over the accounting store, then exit.
async fn run() -> Result<BatchReport, Error> {
    let store_config = StoreConfig::from_env()?;
    let llm_config = LlmConfig::from_env();
    let policy = RepairPolicy::from_env()?;
    tracing::debug!("Stores: {:?}, model: {:?}, repair: {:?}", store_config.tables, llm_config, policy);

    let pools = get_db_pools(&store_config).await?;
    let tables = store_config.tables;
    let candidates = AccountingStore::new(pools.accounting, tables.job_table, tables.job_script_table);
    let results = ResultStore::new(pools.results, tables.results_table);

    let analyzer = ScriptAnalyzer::from_config(&llm_config, policy)?;

    run_batch(&candidates, &results, &analyzer).await
}
