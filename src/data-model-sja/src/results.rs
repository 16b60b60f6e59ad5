//! The results table: provisioning, the per-job existence check, inserts and the per-user rollup.

use async_trait::async_trait;
use diesel::sql_types::{Integer, Nullable, Text, Unsigned};
use diesel_async::RunQueryDsl;

use crate::Error;
use crate::db::DbPool;
use crate::models::{AnalysisResult, CountResult, NewAnalysisResult, Provisioning, UserLanguageCount};
use crate::script_info::MAX_LANGUAGE_LEN;
use crate::store::ResultRepository;
use crate::tables::TableName;

/// Column layout of the results table.
pub fn create_table_statement(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
            id INT PRIMARY KEY AUTO_INCREMENT, \
            language VARCHAR({}) NULL, \
            module TEXT NULL, \
            package TEXT NULL, \
            technique TEXT NULL, \
            summary TEXT NULL, \
            user_id INT UNSIGNED NULL, \
            job_id INT UNSIGNED NULL, \
            error_summary TEXT NULL\
        )",
        table.quoted(),
        MAX_LANGUAGE_LEN
    )
}

const TABLE_EXISTS: &str =
    "SELECT COUNT(*) AS count FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?";

/// MySQL-backed results table.
#[derive(Clone)]
pub struct ResultStore {
    pool: DbPool,
    table: TableName,
}

impl ResultStore {
    pub fn new(pool: DbPool, table: TableName) -> Self {
        Self { pool, table }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub async fn table_exists(&self) -> Result<bool, Error> {
        let mut conn = self.pool.get().await?;

        let found = diesel::sql_query(TABLE_EXISTS)
            .bind::<Text, _>(self.table.as_str().to_string())
            .get_result::<CountResult>(&mut conn)
            .await?;

        Ok(found.count > 0)
    }
}

#[async_trait]
impl ResultRepository for ResultStore {
    async fn ensure_table(&self) -> Result<Provisioning, Error> {
        if self.table_exists().await? {
            tracing::debug!("Results table {} already exists", self.table);
            return Ok(Provisioning::AlreadyPresent);
        }

        let mut conn = self.pool.get().await?;
        diesel::sql_query(create_table_statement(&self.table))
            .execute(&mut conn)
            .await?;

        tracing::info!("Created results table {}", self.table);
        Ok(Provisioning::Created)
    }

    async fn already_analyzed(&self, job_id: u32) -> Result<bool, Error> {
        let mut conn = self.pool.get().await?;

        let found = diesel::sql_query(format!(
            "SELECT COUNT(*) AS count FROM {} WHERE job_id = ?",
            self.table.quoted()
        ))
        .bind::<Unsigned<Integer>, _>(job_id)
        .get_result::<CountResult>(&mut conn)
        .await?;

        Ok(found.count > 0)
    }

    async fn persist(&self, record: &NewAnalysisResult) -> Result<(), Error> {
        let mut conn = self.pool.get().await?;

        diesel::sql_query(format!(
            "INSERT INTO {} (language, module, package, technique, summary, user_id, job_id, error_summary) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            self.table.quoted()
        ))
        .bind::<Nullable<Text>, _>(record.language.clone())
        .bind::<Nullable<Text>, _>(record.module.clone())
        .bind::<Nullable<Text>, _>(record.package.clone())
        .bind::<Nullable<Text>, _>(record.technique.clone())
        .bind::<Nullable<Text>, _>(record.summary.clone())
        .bind::<Unsigned<Integer>, _>(record.user_id)
        .bind::<Unsigned<Integer>, _>(record.job_id)
        .bind::<Nullable<Text>, _>(record.error_summary.clone())
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    async fn find_by_job_id(&self, job_id: u32) -> Result<Option<AnalysisResult>, Error> {
        let mut conn = self.pool.get().await?;

        let mut rows = diesel::sql_query(format!(
            "SELECT id, language, module, package, technique, summary, user_id, job_id, error_summary \
             FROM {} WHERE job_id = ? ORDER BY id LIMIT 1",
            self.table.quoted()
        ))
        .bind::<Unsigned<Integer>, _>(job_id)
        .load::<AnalysisResult>(&mut conn)
        .await?;

        Ok(rows.pop())
    }

    async fn language_counts(&self) -> Result<Vec<UserLanguageCount>, Error> {
        if !self.table_exists().await? {
            tracing::warn!("Results table {} does not exist yet; nothing to summarize", self.table);
            return Ok(Vec::new());
        }

        let mut conn = self.pool.get().await?;
        let counts = diesel::sql_query(format!(
            "SELECT user_id, COUNT(*) AS job_count, language FROM {} GROUP BY user_id, language",
            self.table.quoted()
        ))
        .load::<UserLanguageCount>(&mut conn)
        .await?;

        Ok(counts)
    }
}
