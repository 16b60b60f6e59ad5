//! Process configuration read from the environment (and `.env`, loaded by the binaries).
//!
//! Every reader takes a lookup function so tests can supply variables without
//! touching the process environment; `from_env` wires in `std::env`.

use data_model_sja::tables::{TableNameError, TableNames};

use crate::analysis::RepairPolicy;
use crate::common::env::env_lookup;

pub const DEFAULT_LLM_API_BASE: &str = "http://localhost:11434/v1";
pub const DEFAULT_LLM_API_KEY: &str = "ollama";
pub const DEFAULT_LLM_MODEL: &str = "mixtral:latest";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file or present as an env var")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("Invalid table name: {0}")]
    TableName(#[from] TableNameError),
}

fn read<F>(lookup: &F, var_name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var_name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Where jobs are read from and results are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub accounting_url: String,
    pub results_url: String,
    pub tables: TableNames,
}

impl StoreConfig {
    /// `ACCOUNTING_DATABASE_URL` (or `DATABASE_URL`) is required. `RESULTS_DATABASE_URL`
    /// defaults to the accounting database.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let accounting_url = read(&lookup, "ACCOUNTING_DATABASE_URL")
            .or_else(|| read(&lookup, "DATABASE_URL"))
            .ok_or(ConfigError::Missing("ACCOUNTING_DATABASE_URL"))?;
        let results_url = read(&lookup, "RESULTS_DATABASE_URL").unwrap_or_else(|| accounting_url.clone());
        let tables = TableNames::from_lookup(|k| read(&lookup, k))?;

        Ok(StoreConfig {
            accounting_url,
            results_url,
            tables,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// True when results are written into the accounting database itself.
    pub fn shares_database(&self) -> bool {
        self.accounting_url == self.results_url
    }
}

/// Connection settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Model used for repair passes.
    pub repair_model: String,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("repair_model", &self.repair_model)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_base: DEFAULT_LLM_API_BASE.to_string(),
            api_key: DEFAULT_LLM_API_KEY.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            repair_model: DEFAULT_LLM_MODEL.to_string(),
        }
    }
}

impl LlmConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = read(&lookup, "LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        LlmConfig {
            api_base: read(&lookup, "LLM_API_BASE").unwrap_or_else(|| DEFAULT_LLM_API_BASE.to_string()),
            api_key: read(&lookup, "LLM_API_KEY").unwrap_or_else(|| DEFAULT_LLM_API_KEY.to_string()),
            repair_model: read(&lookup, "LLM_REPAIR_MODEL").unwrap_or_else(|| model.clone()),
            model,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// The same endpoint, talking to the repair model.
    pub fn for_repair(&self) -> LlmConfig {
        LlmConfig {
            model: self.repair_model.clone(),
            ..self.clone()
        }
    }
}

impl RepairPolicy {
    /// `REPAIR_MAX_ATTEMPTS`, defaulting to a single repair pass.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match read(&lookup, "REPAIR_MAX_ATTEMPTS") {
            None => Ok(RepairPolicy::default()),
            Some(value) => value
                .parse::<u32>()
                .map(|max_attempts| RepairPolicy { max_attempts })
                .map_err(|e| ConfigError::Invalid {
                    name: "REPAIR_MAX_ATTEMPTS",
                    reason: format!("'{}' is not a non-negative integer: {}", value, e),
                }),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}
