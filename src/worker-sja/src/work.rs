use core_sja::{LlmProvider, ScriptAnalyzer};
use data_model_sja::{
    CandidateSource, ResultRepository, ScriptInfo,
    models::{AnalysisOutcome, JobScript, NewAnalysisResult},
};

use crate::errors::Error;

/// Outcome of running one script through the model.
pub enum JobResult {
    /// The model produced schema-conformant metadata, possibly after repair.
    Analyzed { info: ScriptInfo },
    /// The output could not be validated, or the prompt could not be built.
    /// Recorded as a failed result so the job is not analyzed again.
    AnalysisFailed { error: core_sja::Error },
    /// The model service failed. Nothing is recorded, so the next run retries the job.
    ModelFailed { error: core_sja::Error },
}

/// What happened to a job in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDisposition {
    /// A result already existed.
    Skipped,
    /// Metadata was stored.
    Analyzed,
    /// A failed result (with `error_summary`) was stored.
    RecordedFailure,
    /// The model could not be reached; left for the next run.
    Deferred,
}

/// Counts for one pass over the accounting store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub skipped: usize,
    pub analyzed: usize,
    pub recorded_failures: usize,
    /// Jobs with nothing written: deferred model failures and job-local store errors.
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, disposition: JobDisposition) {
        match disposition {
            JobDisposition::Skipped => self.skipped += 1,
            JobDisposition::Analyzed => self.analyzed += 1,
            JobDisposition::RecordedFailure => self.recorded_failures += 1,
            JobDisposition::Deferred => self.failed += 1,
        }
    }

    /// Jobs whose result row was written in this run.
    pub fn processed(&self) -> usize {
        self.analyzed + self.recorded_failures
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched {} jobs: {} skipped, {} analyzed, {} recorded as failed, {} failed without a record",
            self.fetched, self.skipped, self.analyzed, self.recorded_failures, self.failed
        )
    }
}

/// Sends the job's script to the model and validates the output.
pub async fn handle_job<P: LlmProvider, R: LlmProvider>(analyzer: &ScriptAnalyzer<P, R>, job: &JobScript) -> JobResult {
    let raw_output = match analyzer.analyze(&job.script_text).await {
        Ok(raw) => raw,
        Err(e) => return classify_failure(e),
    };
    tracing::debug!("[job: {}] Model returned {} bytes", job.job_id, raw_output.len());

    match analyzer.validate(&raw_output).await {
        Ok(info) => {
            tracing::debug!("[job: {}] Parsed script info (language: {})", job.job_id, info.language);
            JobResult::Analyzed { info }
        }
        Err(e) => {
            tracing::warn!("[job: {}] Failed to analyze script: {}", job.job_id, e);
            classify_failure(e)
        }
    }
}

fn classify_failure(error: core_sja::Error) -> JobResult {
    if error.is_model_failure() {
        JobResult::ModelFailed { error }
    } else {
        JobResult::AnalysisFailed { error }
    }
}

/// Writes the job's result row. Model failures write nothing.
pub async fn handle_result<S: ResultRepository + ?Sized>(
    results: &S,
    job: &JobScript,
    result: JobResult,
) -> Result<JobDisposition, Error> {
    match result {
        JobResult::Analyzed { info } => {
            let record = NewAnalysisResult::from_outcome(job, AnalysisOutcome::Ok { info });
            results.persist(&record).await?;
            tracing::debug!("[job: {}] Stored script info", job.job_id);
            Ok(JobDisposition::Analyzed)
        }

        JobResult::AnalysisFailed { error } => {
            tracing::error!("[job: {}] Recording failed analysis. Error: {}", job.job_id, error);
            let record = NewAnalysisResult::from_outcome(
                job,
                AnalysisOutcome::Error {
                    failure_reason: error.to_string(),
                },
            );
            results.persist(&record).await?;
            tracing::debug!("[job: {}] Stored failure", job.job_id);
            Ok(JobDisposition::RecordedFailure)
        }

        JobResult::ModelFailed { error } => {
            tracing::error!(
                "[job: {}] Model invocation failed, will retry on next run. Error: {}",
                job.job_id,
                error
            );
            Ok(JobDisposition::Deferred)
        }
    }
}

/// Dedup check, analysis and persistence for one job.
pub async fn process_job<S, P, R>(
    results: &S,
    analyzer: &ScriptAnalyzer<P, R>,
    job: &JobScript,
) -> Result<JobDisposition, Error>
where
    S: ResultRepository + ?Sized,
    P: LlmProvider,
    R: LlmProvider,
{
    if results.already_analyzed(job.job_id).await? {
        tracing::info!("Job with ID: {} exists, skipping.", job.job_id);
        return Ok(JobDisposition::Skipped);
    }

    let result = handle_job(analyzer, job).await;
    let disposition = handle_result(results, job, result).await?;
    if disposition != JobDisposition::Deferred {
        tracing::info!("Job with ID: {} processed.", job.job_id);
    }
    Ok(disposition)
}

/// Analyzes every job in the accounting store that has no result yet, one at a time.
///
/// Provisioning the results table and fetching candidates are fatal for the batch.
/// Anything that goes wrong with an individual job is logged and counted, and the
/// batch moves on to the next job.
pub async fn run_batch<C, S, P, R>(
    candidates: &C,
    results: &S,
    analyzer: &ScriptAnalyzer<P, R>,
) -> Result<BatchReport, Error>
where
    C: CandidateSource + ?Sized,
    S: ResultRepository + ?Sized,
    P: LlmProvider,
    R: LlmProvider,
{
    let provisioning = results.ensure_table().await?;
    tracing::debug!("Results table: {:?}", provisioning);

    let jobs = candidates.fetch_candidates().await?;
    tracing::info!("Fetched {} jobs with batch scripts", jobs.len());

    let mut report = BatchReport {
        fetched: jobs.len(),
        ..BatchReport::default()
    };

    for job in &jobs {
        match process_job(results, analyzer, job).await {
            Ok(disposition) => report.record(disposition),
            Err(error) => {
                tracing::error!("[SKIP] [job: {}] Failed to process job (user {}): {}", job.job_id, job.user_id, error);
                report.failed += 1;
            }
        }
    }

    tracing::info!("Batch complete: {}", report);
    Ok(report)
}
