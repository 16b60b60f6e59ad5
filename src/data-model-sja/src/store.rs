//! Seams between the pipeline and its stores. MySQL implementations live in
//! `accounting` and `results`; in-memory ones in `test_helpers`.

use async_trait::async_trait;

use crate::Error;
use crate::models::{AnalysisResult, JobScript, NewAnalysisResult, Provisioning, UserLanguageCount};

/// Read-only source of jobs to analyze.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Every job that has a recorded batch script, whether or not it was analyzed already.
    /// `Ok` with an empty list means there is nothing to do; a failed fetch is an `Err`.
    async fn fetch_candidates(&self) -> Result<Vec<JobScript>, Error>;
}

/// The owned, append-only table of analysis results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Creates the results table if it is absent. Safe to call on every run.
    async fn ensure_table(&self) -> Result<Provisioning, Error>;

    /// True iff a result row exists for the job.
    async fn already_analyzed(&self, job_id: u32) -> Result<bool, Error>;

    /// Inserts one row. Each call commits on its own.
    async fn persist(&self, record: &NewAnalysisResult) -> Result<(), Error>;

    async fn find_by_job_id(&self, job_id: u32) -> Result<Option<AnalysisResult>, Error>;

    /// Job counts grouped by (user, language). Empty when the table does not exist.
    async fn language_counts(&self) -> Result<Vec<UserLanguageCount>, Error>;
}
