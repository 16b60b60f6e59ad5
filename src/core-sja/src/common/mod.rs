pub mod config;
pub mod db_env;
pub mod env;
pub mod logging;

pub use config::{ConfigError, LlmConfig, StoreConfig};
pub use env::is_env_set;
pub use logging::setup_logging;
