use diesel::QueryableByName;
use diesel::sql_types::{BigInt, Integer, Nullable, Text, Unsigned};
use serde::{Deserialize, Serialize};

use crate::script_info::ScriptInfo;

/// Delimiter used to store list-valued fields in a single text column.
pub const LIST_DELIMITER: &str = ",";

/// Joins list elements into the single text value stored in the results table.
pub fn join_list(items: &[String]) -> String {
    items.join(LIST_DELIMITER)
}

/// Inverse of `join_list` for tokens that do not contain the delimiter.
/// An empty column is an empty list.
pub fn split_list(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(LIST_DELIMITER).map(str::to_string).collect()
    }
}

/// One job from the slurmdbd accounting store along with its submitted batch script.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct JobScript {
    #[diesel(sql_type = Unsigned<Integer>)]
    pub job_id: u32,
    #[diesel(sql_type = Unsigned<Integer>)]
    pub user_id: u32,
    #[diesel(sql_type = Text)]
    pub script_text: String,
}

impl JobScript {
    pub fn new(job_id: u32, user_id: u32, script_text: impl Into<String>) -> Self {
        JobScript {
            job_id,
            user_id,
            script_text: script_text.into(),
        }
    }
}

// results table model (database representation)
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName, Serialize, Deserialize)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct AnalysisResult {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub language: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub module: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub package: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub technique: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub summary: Option<String>,
    #[diesel(sql_type = Nullable<Unsigned<Integer>>)]
    pub user_id: Option<u32>,
    #[diesel(sql_type = Nullable<Unsigned<Integer>>)]
    pub job_id: Option<u32>,
    #[diesel(sql_type = Nullable<Text>)]
    pub error_summary: Option<String>,
}

impl AnalysisResult {
    /// Convert database representation to ergonomic outcome enum
    pub fn to_outcome(&self) -> AnalysisOutcome {
        match &self.error_summary {
            Some(failure_reason) => AnalysisOutcome::Error {
                failure_reason: failure_reason.clone(),
            },
            None => AnalysisOutcome::Ok {
                info: ScriptInfo {
                    language: self.language.clone().unwrap_or_default(),
                    module: split_list(self.module.as_deref().unwrap_or_default()),
                    package: split_list(self.package.as_deref().unwrap_or_default()),
                    technique: split_list(self.technique.as_deref().unwrap_or_default()),
                    summary: self.summary.clone().unwrap_or_default(),
                },
            },
        }
    }
}

// AnalysisOutcome - ergonomic Rust enum for what happened to a job
/// Result of analysing one job's script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AnalysisOutcome {
    /// The model produced schema-conformant metadata
    Ok { info: ScriptInfo },
    /// Analysis could not be completed, with the reason
    Error { failure_reason: String },
}

/// A row to insert into the results table. The surrogate `id` is assigned by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnalysisResult {
    pub language: Option<String>,
    pub module: Option<String>,
    pub package: Option<String>,
    pub technique: Option<String>,
    pub summary: Option<String>,
    pub user_id: u32,
    pub job_id: u32,
    pub error_summary: Option<String>,
}

impl NewAnalysisResult {
    /// Create database representation from ergonomic outcome enum
    pub fn from_outcome(job: &JobScript, outcome: AnalysisOutcome) -> Self {
        match outcome {
            AnalysisOutcome::Ok { info } => NewAnalysisResult {
                language: Some(info.language),
                module: Some(join_list(&info.module)),
                package: Some(join_list(&info.package)),
                technique: Some(join_list(&info.technique)),
                summary: Some(info.summary),
                user_id: job.user_id,
                job_id: job.job_id,
                error_summary: None,
            },
            AnalysisOutcome::Error { failure_reason } => NewAnalysisResult {
                language: None,
                module: None,
                package: None,
                technique: None,
                summary: None,
                user_id: job.user_id,
                job_id: job.job_id,
                error_summary: Some(failure_reason),
            },
        }
    }

    /// The row as it reads back once the database assigns it `id`.
    pub fn with_id(self, id: i32) -> AnalysisResult {
        AnalysisResult {
            id,
            language: self.language,
            module: self.module,
            package: self.package,
            technique: self.technique,
            summary: self.summary,
            user_id: Some(self.user_id),
            job_id: Some(self.job_id),
            error_summary: self.error_summary,
        }
    }
}

/// Number of analyzed jobs per (user, language) group.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName, Serialize, Deserialize)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct UserLanguageCount {
    #[diesel(sql_type = Nullable<Unsigned<Integer>>)]
    pub user_id: Option<u32>,
    #[diesel(sql_type = BigInt)]
    pub job_count: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub language: Option<String>,
}

/// Helper struct for COUNT queries
#[derive(Debug, QueryableByName)]
pub(crate) struct CountResult {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

/// What `ensure_table` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    Created,
    AlreadyPresent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_list_round_trip() {
        for list in [
            tokens(&[]),
            tokens(&["bash"]),
            tokens(&["torch", "numpy", "mpi4py"]),
            tokens(&["with space", "dash-ed", "dot.ted"]),
        ] {
            assert_eq!(split_list(&join_list(&list)), list);
        }
    }

    #[test]
    fn test_join_list_uses_comma() {
        assert_eq!(join_list(&tokens(&["a", "b", "c"])), "a,b,c");
        assert_eq!(join_list(&tokens(&[])), "");
    }

    #[test]
    fn test_from_outcome_ok() {
        let job = JobScript::new(42, 7, "#!/bin/bash\npython train.py");
        let info = ScriptInfo {
            language: "Python".to_string(),
            module: tokens(&["bash"]),
            package: tokens(&[]),
            technique: tokens(&["batch-scripting"]),
            summary: "Runs a training script via bash.".to_string(),
        };

        let row = NewAnalysisResult::from_outcome(&job, AnalysisOutcome::Ok { info: info.clone() });
        assert_eq!(row.job_id, 42);
        assert_eq!(row.user_id, 7);
        assert_eq!(row.language.as_deref(), Some("Python"));
        assert_eq!(row.module.as_deref(), Some("bash"));
        assert_eq!(row.package.as_deref(), Some(""));
        assert_eq!(row.technique.as_deref(), Some("batch-scripting"));
        assert_eq!(row.summary.as_deref(), Some("Runs a training script via bash."));
        assert_eq!(row.error_summary, None);

        let stored = row.with_id(1);
        assert_eq!(stored.to_outcome(), AnalysisOutcome::Ok { info });
    }

    #[test]
    fn test_from_outcome_error() {
        let job = JobScript::new(9, 1000, "echo hi");
        let outcome = AnalysisOutcome::Error {
            failure_reason: "Model output does not contain a JSON object".to_string(),
        };

        let row = NewAnalysisResult::from_outcome(&job, outcome.clone());
        assert_eq!(row.language, None);
        assert_eq!(row.module, None);
        assert_eq!(row.package, None);
        assert_eq!(row.technique, None);
        assert_eq!(row.summary, None);
        assert_eq!(row.error_summary.as_deref(), Some("Model output does not contain a JSON object"));

        assert_eq!(row.with_id(3).to_outcome(), outcome);
    }
}
