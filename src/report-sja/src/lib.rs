//! Read-only summary of the results table: which languages each user's jobs are written in.

use core_sja::common::ConfigError;
use data_model_sja::{
    ResultRepository,
    db::ConnectionPoolError,
    summary::{UserSummaries, summarize},
};

#[derive(Debug)]
pub enum Error {
    StoreError(data_model_sja::Error),
    ConfigError(ConfigError),
    PoolError(ConnectionPoolError),
    RenderError(serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreError(store_error) => write!(f, "{}", store_error),
            Self::ConfigError(config_error) => write!(f, "Configuration error: {}", config_error),
            Self::PoolError(pool_error) => write!(f, "{}", pool_error),
            Self::RenderError(json_error) => write!(f, "Failed to render summary as JSON: {}", json_error),
        }
    }
}

impl std::error::Error for Error {}

impl From<data_model_sja::Error> for Error {
    fn from(error: data_model_sja::Error) -> Self {
        Self::StoreError(error)
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

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::RenderError(error)
    }
}

/// Per-user language summary. Empty if nothing has been analyzed yet.
pub async fn summarize_results<S: ResultRepository + ?Sized>(results: &S) -> Result<UserSummaries, Error> {
    let counts = results.language_counts().await?;
    tracing::debug!("Read {} (user, language) groups", counts.len());
    Ok(summarize(counts))
}

pub fn render_json(summaries: &UserSummaries) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(summaries)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use data_model_sja::{
        ScriptInfo,
        models::{AnalysisOutcome, JobScript, NewAnalysisResult},
        summary::UserSummary,
        test_helpers::InMemoryResults,
    };

    fn analyzed(job_id: u32, user_id: u32, language: &str) -> NewAnalysisResult {
        NewAnalysisResult::from_outcome(
            &JobScript::new(job_id, user_id, ""),
            AnalysisOutcome::Ok {
                info: ScriptInfo {
                    language: language.to_string(),
                    ..ScriptInfo::default()
                },
            },
        )
    }

    fn failed(job_id: u32, user_id: u32) -> NewAnalysisResult {
        NewAnalysisResult::from_outcome(
            &JobScript::new(job_id, user_id, ""),
            AnalysisOutcome::Error {
                failure_reason: "unparseable".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_summarize_results() {
        let results = InMemoryResults::with_rows(vec![
            analyzed(1, 1, "Python"),
            analyzed(2, 1, "Python"),
            analyzed(3, 1, "Python"),
            analyzed(4, 1, "bash"),
            analyzed(5, 1, "bash"),
            analyzed(6, 2, "Python"),
        ]);

        let summaries = summarize_results(&results).await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(
            summaries["1"],
            UserSummary {
                language: vec![Some("Python".to_string()), Some("bash".to_string())],
                job_count: 5,
            }
        );
        assert_eq!(
            summaries["2"],
            UserSummary {
                language: vec![Some("Python".to_string())],
                job_count: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_analyses_count_with_null_language() {
        let results = InMemoryResults::with_rows(vec![analyzed(1, 9, "R"), failed(2, 9)]);

        let summaries = summarize_results(&results).await.unwrap();

        assert_eq!(summaries["9"].job_count, 2);
        assert_eq!(summaries["9"].language, vec![Some("R".to_string()), None]);
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let results = InMemoryResults::new();
        let summaries = summarize_results(&results).await.unwrap();
        assert!(summaries.is_empty());
        assert_eq!(render_json(&summaries).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_render_json() {
        let results = InMemoryResults::with_rows(vec![analyzed(1, 1, "Python"), analyzed(2, 1, "bash")]);
        let json = render_json(&summarize_results(&results).await.unwrap()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "1": { "language": ["Python", "bash"], "job_count": 2 } })
        );
    }
}
