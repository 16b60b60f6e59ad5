//! Read access to the slurmdbd accounting store.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;

use crate::Error;
use crate::db::DbPool;
use crate::models::JobScript;
use crate::store::CandidateSource;
use crate::tables::TableName;

/// Fetches jobs and their batch scripts from a cluster's slurmdbd tables.
/// This store never writes.
#[derive(Clone)]
pub struct AccountingStore {
    pool: DbPool,
    job_table: TableName,
    job_script_table: TableName,
}

impl AccountingStore {
    pub fn new(pool: DbPool, job_table: TableName, job_script_table: TableName) -> Self {
        Self {
            pool,
            job_table,
            job_script_table,
        }
    }
}

/// Jobs reference their script through `script_hash_inx`, the script table's `hash_inx`.
pub fn candidates_query(job_table: &TableName, job_script_table: &TableName) -> String {
    format!(
        "SELECT t1.id_job AS job_id, t1.id_user AS user_id, t2.batch_script AS script_text \
         FROM {} AS t1 JOIN {} AS t2 ON t1.script_hash_inx = t2.hash_inx",
        job_table.quoted(),
        job_script_table.quoted()
    )
}

#[async_trait]
impl CandidateSource for AccountingStore {
    async fn fetch_candidates(&self) -> Result<Vec<JobScript>, Error> {
        let mut conn = self.pool.get().await?;

        let jobs = diesel::sql_query(candidates_query(&self.job_table, &self.job_script_table))
            .load::<JobScript>(&mut conn)
            .await?;

        tracing::debug!(
            "Fetched {} job scripts from {} joined with {}",
            jobs.len(),
            self.job_table,
            self.job_script_table
        );
        Ok(jobs)
    }
}
