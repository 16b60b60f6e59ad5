use core_sja::common::ConfigError;
use data_model_sja::db::ConnectionPoolError;

#[derive(Debug)]
pub enum Error {
    StoreError(data_model_sja::Error),
    CoreError(core_sja::Error),
    ConfigError(ConfigError),
    PoolError(ConnectionPoolError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreError(store_error) => write!(f, "{}", store_error),
            Self::CoreError(core_error) => write!(f, "{}", core_error),
            Self::ConfigError(config_error) => write!(f, "Configuration error: {}", config_error),
            Self::PoolError(pool_error) => write!(f, "{}", pool_error),
        }
    }
}

impl std::error::Error for Error {}

impl From<data_model_sja::Error> for Error {
    fn from(error: data_model_sja::Error) -> Self {
        Self::StoreError(error)
    }
}

impl From<core_sja::Error> for Error {
    fn from(error: core_sja::Error) -> Self {
        Self::CoreError(error)
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Self::ConfigError(error)
    }
}

impl From<ConnectionPoolError> for Error {
    fn from(error: ConnectionPoolError) -> Self {
        Self::PoolError(error)
    }
}
