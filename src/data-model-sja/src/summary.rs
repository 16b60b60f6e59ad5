//! Per-user rollup of analyzed jobs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::UserLanguageCount;

/// Key used for rows whose `user_id` is NULL.
pub const UNKNOWN_USER: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// One entry per (user, language) group, in the order the groups were read.
    /// A NULL language (failed analyses) is kept as `None`.
    pub language: Vec<Option<String>>,
    pub job_count: i64,
}

/// Summaries keyed by `user_id` rendered as a string.
pub type UserSummaries = BTreeMap<String, UserSummary>;

/// Folds grouped counts into one summary per user.
/// Languages are appended once per group and never de-duplicated; job counts are summed.
pub fn summarize<I>(rows: I) -> UserSummaries
where
    I: IntoIterator<Item = UserLanguageCount>,
{
    let mut summaries = UserSummaries::new();
    for row in rows {
        let key = row
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        let summary = summaries.entry(key).or_default();
        summary.language.push(row.language);
        summary.job_count += row.job_count;
    }
    summaries
}
