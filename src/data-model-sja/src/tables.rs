//! Validated table names.
//!
//! Table names cannot be bound as query parameters, so they are interpolated into SQL.
//! A `TableName` only exists for identifiers that are safe to interpolate between backticks.

pub const DEFAULT_JOB_TABLE: &str = "my-cluster_job_table";
pub const DEFAULT_JOB_SCRIPT_TABLE: &str = "my-cluster_job_script_table";
pub const DEFAULT_RESULTS_TABLE: &str = "slurm_job_info";

/// MySQL's limit on identifier length.
const MAX_IDENTIFIER_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableNameError {
    #[error("Table name is empty")]
    Empty,
    #[error("Table name '{0}' is longer than 64 characters")]
    TooLong(String),
    #[error("Table name '{0}' may only contain ASCII letters, digits, '_', '$' and '-'")]
    InvalidCharacters(String),
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct TableName(String);

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TableName {
    /// Create a new instance if the name is a valid identifier. Returns an error on failure.
    pub fn new(maybe_valid: impl Into<String>) -> Result<Self, TableNameError> {
        let name = maybe_valid.into();
        Self::check(&name)?;
        Ok(TableName(name))
    }

    fn check(name: &str) -> Result<(), TableNameError> {
        if name.is_empty() {
            Err(TableNameError::Empty)
        } else if name.len() > MAX_IDENTIFIER_LEN {
            Err(TableNameError::TooLong(name.to_string()))
        } else if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-')
        {
            Err(TableNameError::InvalidCharacters(name.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name quoted for interpolation into a MySQL statement.
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0)
    }
}

/// The three tables the pipeline touches: two upstream slurmdbd tables and the owned results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Cluster job table, `<cluster>_job_table` in slurmdbd.
    pub job_table: TableName,
    /// Cluster job script table, `<cluster>_job_script_table` in slurmdbd.
    pub job_script_table: TableName,
    /// Destination table for analysis results.
    pub results_table: TableName,
}

impl TableNames {
    /// Reads `SLURM_JOB_TABLE`, `SLURM_JOB_SCRIPT_TABLE` and `RESULTS_TABLE` from the lookup,
    /// falling back to the defaults for any that are unset or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TableNameError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &str, default: &str| {
            let value = lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string());
            TableName::new(value)
        };

        Ok(TableNames {
            job_table: read("SLURM_JOB_TABLE", DEFAULT_JOB_TABLE)?,
            job_script_table: read("SLURM_JOB_SCRIPT_TABLE", DEFAULT_JOB_SCRIPT_TABLE)?,
            results_table: read("RESULTS_TABLE", DEFAULT_RESULTS_TABLE)?,
        })
    }
}

impl Default for TableNames {
    fn default() -> Self {
        // The defaults are compile-time constants that satisfy the identifier rules.
        TableNames::from_lookup(|_| None).unwrap_or_else(|e| unreachable!("invalid default table name: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_valid_table_names() {
        assert!(TableName::new("slurm_job_info").is_ok());
        assert!(TableName::new("my-cluster_job_table").is_ok());
        assert!(TableName::new("cluster$1").is_ok());
        assert!(TableName::new("x".repeat(64)).is_ok());
    }

    #[test]
    fn test_invalid_table_names() {
        assert_eq!(TableName::new(""), Err(TableNameError::Empty));
        assert!(matches!(
            TableName::new("jobs`; DROP TABLE users; --"),
            Err(TableNameError::InvalidCharacters(_))
        ));
        assert!(matches!(TableName::new("a b"), Err(TableNameError::InvalidCharacters(_))));
        assert!(matches!(TableName::new("x".repeat(65)), Err(TableNameError::TooLong(_))));
    }

    #[test]
    fn test_quoted() {
        let name = TableName::new("my-cluster_job_table").unwrap();
        assert_eq!(name.quoted(), "`my-cluster_job_table`");
        assert_eq!(name.to_string(), "my-cluster_job_table");
    }

    #[test]
    fn test_table_names_defaults() {
        let tables = TableNames::default();
        assert_eq!(tables.job_table.as_str(), DEFAULT_JOB_TABLE);
        assert_eq!(tables.job_script_table.as_str(), DEFAULT_JOB_SCRIPT_TABLE);
        assert_eq!(tables.results_table.as_str(), DEFAULT_RESULTS_TABLE);
    }

    #[test]
    fn test_table_names_from_vars() {
        let vars = HashMap::from([
            ("SLURM_JOB_TABLE".to_string(), "hpc_job_table".to_string()),
            ("RESULTS_TABLE".to_string(), "  ".to_string()),
        ]);
        let tables = TableNames::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(tables.job_table.as_str(), "hpc_job_table");
        assert_eq!(tables.job_script_table.as_str(), DEFAULT_JOB_SCRIPT_TABLE);
        assert_eq!(tables.results_table.as_str(), DEFAULT_RESULTS_TABLE);
    }

    #[test]
    fn test_table_names_rejects_bad_override() {
        let vars = HashMap::from([("RESULTS_TABLE".to_string(), "bad name".to_string())]);
        assert!(matches!(
            TableNames::from_lookup(|k| vars.get(k).cloned()),
            Err(TableNameError::InvalidCharacters(_))
        ));
    }
}
