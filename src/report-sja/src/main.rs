use core_sja::common::{StoreConfig, db_env::get_results_pool, setup_logging};
use data_model_sja::results::ResultStore;

use report_sja::{Error, render_json, summarize_results};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file., if it exists
    dotenvy::dotenv().ok();

    setup_logging("report_sja=info,data_model_sja=info");

    match run().await {
        Ok(json) => println!("{}", json),
        Err(error) => {
            tracing::error!("Failed to summarize results: {}", error);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<String, Error> {
    let store_config = StoreConfig::from_env()?;
    let pool = get_results_pool(&store_config).await?;
    let results = ResultStore::new(pool, store_config.tables.results_table);

    let summaries = summarize_results(&results).await?;
    tracing::info!("Summarized jobs for {} users", summaries.len());
    render_json(&summaries)
}
