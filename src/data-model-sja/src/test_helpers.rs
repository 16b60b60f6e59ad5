//! Test utilities
//!
//! In-memory implementations of the store traits so pipeline logic can be tested
//! without a database, plus helpers for tests that run against a real MySQL server.
//! Database-backed tests only run when `TEST_DATABASE_URL` is set.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Integer, Text, Unsigned};

use crate::Error;
use crate::db::{DbPool, establish_connection_pool};
use crate::models::{AnalysisResult, JobScript, NewAnalysisResult, Provisioning, UserLanguageCount};
use crate::store::{CandidateSource, ResultRepository};
use crate::tables::TableName;

// =============================================================================
// In-memory stores
// =============================================================================

/// Serves a fixed list of jobs, or fails every fetch.
#[derive(Debug, Default)]
pub struct InMemoryCandidates {
    jobs: Vec<JobScript>,
    should_fail: bool,
    fetches: AtomicUsize,
}

impl InMemoryCandidates {
    pub fn new(jobs: Vec<JobScript>) -> Self {
        Self {
            jobs,
            should_fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose fetch always fails, as an unreachable accounting store would.
    pub fn with_failure() -> Self {
        Self {
            jobs: Vec::new(),
            should_fail: true,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateSource for InMemoryCandidates {
    async fn fetch_candidates(&self) -> Result<Vec<JobScript>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(Error::DbPoolError("In-memory accounting store configured to fail".to_string()));
        }
        Ok(self.jobs.clone())
    }
}

#[derive(Debug, Default)]
struct ResultsState {
    table_exists: bool,
    rows: Vec<AnalysisResult>,
}

/// Results table kept in a `Vec`. Behaves like the MySQL table: queries fail until
/// `ensure_table` has run, ids are assigned on insert, and rows are never updated.
#[derive(Debug)]
pub struct InMemoryResults {
    table: String,
    state: Mutex<ResultsState>,
    fail_persist: AtomicBool,
    fail_provisioning: AtomicBool,
}

impl Default for InMemoryResults {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryResults {
    /// An empty store whose table has not been provisioned yet.
    pub fn new() -> Self {
        Self {
            table: crate::tables::DEFAULT_RESULTS_TABLE.to_string(),
            state: Mutex::new(ResultsState::default()),
            fail_persist: AtomicBool::new(false),
            fail_provisioning: AtomicBool::new(false),
        }
    }

    /// A store whose table exists and already holds the given rows.
    pub fn with_rows(rows: Vec<NewAnalysisResult>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            state.table_exists = true;
            for row in rows {
                let id = state.rows.len() as i32 + 1;
                state.rows.push(row.with_id(id));
            }
        }
        store
    }

    /// Make every subsequent insert fail.
    pub fn set_fail_persist(&self, should_fail: bool) {
        self.fail_persist.store(should_fail, Ordering::SeqCst);
    }

    /// Make every subsequent `ensure_table` fail.
    pub fn set_fail_provisioning(&self, should_fail: bool) {
        self.fail_provisioning.store(should_fail, Ordering::SeqCst);
    }

    pub fn table_exists(&self) -> bool {
        self.lock().table_exists
    }

    /// Snapshot of all stored rows in insertion order.
    pub fn rows(&self) -> Vec<AnalysisResult> {
        self.lock().rows.clone()
    }

    /// Number of rows stored for a job.
    pub fn count_for_job(&self, job_id: u32) -> usize {
        self.lock().rows.iter().filter(|r| r.job_id == Some(job_id)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResultsState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_table(&self, state: &ResultsState) -> Result<(), Error> {
        if state.table_exists {
            Ok(())
        } else {
            // Same shape as MySQL's ER_NO_SUCH_TABLE
            Err(Error::DbError(DieselError::DatabaseError(
                DatabaseErrorKind::Unknown,
                Box::new(format!("Table '{}' doesn't exist", self.table)),
            )))
        }
    }
}

#[async_trait]
impl ResultRepository for InMemoryResults {
    async fn ensure_table(&self) -> Result<Provisioning, Error> {
        if self.fail_provisioning.load(Ordering::SeqCst) {
            return Err(Error::DbPoolError("In-memory results store configured to fail".to_string()));
        }
        let mut state = self.lock();
        if state.table_exists {
            Ok(Provisioning::AlreadyPresent)
        } else {
            state.table_exists = true;
            Ok(Provisioning::Created)
        }
    }

    async fn already_analyzed(&self, job_id: u32) -> Result<bool, Error> {
        let state = self.lock();
        self.require_table(&state)?;
        Ok(state.rows.iter().any(|r| r.job_id == Some(job_id)))
    }

    async fn persist(&self, record: &NewAnalysisResult) -> Result<(), Error> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(Error::DbPoolError("In-memory results store configured to fail".to_string()));
        }
        let mut state = self.lock();
        self.require_table(&state)?;
        let id = state.rows.len() as i32 + 1;
        state.rows.push(record.clone().with_id(id));
        Ok(())
    }

    async fn find_by_job_id(&self, job_id: u32) -> Result<Option<AnalysisResult>, Error> {
        let state = self.lock();
        self.require_table(&state)?;
        Ok(state.rows.iter().find(|r| r.job_id == Some(job_id)).cloned())
    }

    async fn language_counts(&self) -> Result<Vec<UserLanguageCount>, Error> {
        let state = self.lock();
        if !state.table_exists {
            return Ok(Vec::new());
        }

        // GROUP BY user_id, language with groups in first-seen order
        let mut counts: Vec<UserLanguageCount> = Vec::new();
        for row in &state.rows {
            match counts
                .iter_mut()
                .find(|c| c.user_id == row.user_id && c.language == row.language)
            {
                Some(count) => count.job_count += 1,
                None => counts.push(UserLanguageCount {
                    user_id: row.user_id,
                    job_count: 1,
                    language: row.language.clone(),
                }),
            }
        }
        Ok(counts)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// The batch script from the end-to-end scenario.
pub fn sample_bash_script() -> &'static str {
    "#!/bin/bash\npython train.py"
}

/// A longer, realistic slurm batch script.
pub fn sample_slurm_script() -> &'static str {
    r#"#!/bin/bash
#SBATCH --job-name=train-resnet
#SBATCH --partition=gpu
#SBATCH --gres=gpu:4
#SBATCH --time=12:00:00

module load cuda/12.2 python/3.10
source venv/bin/activate

srun python -m torch.distributed.run --nproc_per_node=4 train.py --epochs 90
"#
}

// =============================================================================
// Database Test Helpers
// =============================================================================

/// Connection pool for the test database, or `None` when `TEST_DATABASE_URL` is not set.
/// Panics if the variable is set but the database cannot be reached.
pub async fn test_db_pool() -> Option<DbPool> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok().filter(|v| !v.is_empty())?;

    let pool = establish_connection_pool(&database_url)
        .await
        .expect("Failed to create test database pool - is the test database running?");
    Some(pool)
}

pub async fn drop_table(pool: &DbPool, table: &TableName) {
    use diesel_async::RunQueryDsl;

    let mut conn = pool.get().await.expect("Failed to get database connection");

    diesel::sql_query(format!("DROP TABLE IF EXISTS {}", table.quoted()))
        .execute(&mut conn)
        .await
        .expect("Failed to drop table");
}

/// (Re)creates minimal versions of the two slurmdbd tables the accounting store joins.
pub async fn create_slurm_tables(pool: &DbPool, job_table: &TableName, job_script_table: &TableName) {
    drop_table(pool, job_table).await;
    drop_table(pool, job_script_table).await;

    use diesel_async::RunQueryDsl;
    let mut conn = pool.get().await.expect("Failed to get database connection");

    diesel::sql_query(format!(
        "CREATE TABLE {} (\
            job_db_inx BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT, \
            id_job INT UNSIGNED NOT NULL, \
            id_user INT UNSIGNED NOT NULL, \
            script_hash_inx BIGINT UNSIGNED NOT NULL DEFAULT 0\
        )",
        job_table.quoted()
    ))
    .execute(&mut conn)
    .await
    .expect("Failed to create job table");

    diesel::sql_query(format!(
        "CREATE TABLE {} (\
            hash_inx BIGINT UNSIGNED PRIMARY KEY AUTO_INCREMENT, \
            batch_script LONGTEXT NOT NULL\
        )",
        job_script_table.quoted()
    ))
    .execute(&mut conn)
    .await
    .expect("Failed to create job script table");
}

/// Inserts one job and its script, linked by the script's hash index (= job id here).
pub async fn insert_slurm_job(
    pool: &DbPool,
    job_table: &TableName,
    job_script_table: &TableName,
    job_id: u32,
    user_id: u32,
    script: &str,
) {
    use diesel_async::RunQueryDsl;

    let mut conn = pool.get().await.expect("Failed to get database connection");

    diesel::sql_query(format!(
        "INSERT INTO {} (hash_inx, batch_script) VALUES (?, ?)",
        job_script_table.quoted()
    ))
    .bind::<BigInt, _>(i64::from(job_id))
    .bind::<Text, _>(script.to_string())
    .execute(&mut conn)
    .await
    .expect("Failed to insert job script");

    diesel::sql_query(format!(
        "INSERT INTO {} (id_job, id_user, script_hash_inx) VALUES (?, ?, ?)",
        job_table.quoted()
    ))
    .bind::<Unsigned<Integer>, _>(job_id)
    .bind::<Unsigned<Integer>, _>(user_id)
    .bind::<BigInt, _>(i64::from(job_id))
    .execute(&mut conn)
    .await
    .expect("Failed to insert job");
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::AnalysisOutcome;
    use crate::script_info::ScriptInfo;

    fn ok_row(job_id: u32, user_id: u32, language: &str) -> NewAnalysisResult {
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

    #[tokio::test]
    async fn test_in_memory_results_requires_table() {
        let store = InMemoryResults::new();
        assert!(matches!(store.already_analyzed(1).await, Err(Error::DbError(_))));
        let missing = store.persist(&ok_row(1, 1, "bash")).await.unwrap_err();
        assert_eq!(missing.to_string(), "Database error: Table 'slurm_job_info' doesn't exist");
        assert!(store.language_counts().await.unwrap().is_empty());

        assert_eq!(store.ensure_table().await.unwrap(), Provisioning::Created);
        assert_eq!(store.ensure_table().await.unwrap(), Provisioning::AlreadyPresent);
        assert!(!store.already_analyzed(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_results_persist_assigns_ids() {
        let store = InMemoryResults::with_rows(vec![ok_row(1, 10, "bash")]);
        store.persist(&ok_row(2, 10, "Python")).await.unwrap();

        let rows = store.rows();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(store.already_analyzed(2).await.unwrap());
        assert_eq!(store.find_by_job_id(2).await.unwrap().unwrap().language.as_deref(), Some("Python"));
    }

    #[tokio::test]
    async fn test_in_memory_language_counts() {
        let store = InMemoryResults::with_rows(vec![
            ok_row(1, 1, "Python"),
            ok_row(2, 1, "bash"),
            ok_row(3, 1, "Python"),
            ok_row(4, 2, "Python"),
        ]);
        let counts = store.language_counts().await.unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[0].job_count, 2);
        assert_eq!(counts[0].language.as_deref(), Some("Python"));
        assert_eq!(counts[1].job_count, 1);
        assert_eq!(counts[2].user_id, Some(2));
    }

    #[tokio::test]
    async fn test_in_memory_failure_switches() {
        let store = InMemoryResults::new();
        store.set_fail_provisioning(true);
        assert!(matches!(store.ensure_table().await, Err(Error::DbPoolError(_))));
        store.set_fail_provisioning(false);
        assert_eq!(store.ensure_table().await.unwrap(), Provisioning::Created);

        store.set_fail_persist(true);
        assert!(matches!(store.persist(&ok_row(1, 1, "bash")).await, Err(Error::DbPoolError(_))));
        store.set_fail_persist(false);
        store.persist(&ok_row(1, 1, "bash")).await.unwrap();
        assert_eq!(store.count_for_job(1), 1);
    }

    #[tokio::test]
    async fn test_in_memory_candidates() {
        let source = InMemoryCandidates::new(vec![JobScript::new(1, 2, sample_bash_script())]);
        assert_eq!(source.fetch_candidates().await.unwrap().len(), 1);
        assert_eq!(source.fetch_count(), 1);

        let failing = InMemoryCandidates::with_failure();
        assert!(failing.fetch_candidates().await.is_err());
    }
}
