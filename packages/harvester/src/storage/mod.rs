//! Persistence seam for searches and job records.

mod postgres;

pub use postgres::PostgresStorage;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{JobDetails, SearchCriteria, SearchId};

/// Store operations the pipeline needs. One implementation talks to
/// Postgres; tests substitute an in-memory map.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up the `(job_title, location, software)` triple, creating it on
    /// first sight. Re-running an existing triple increments its iteration
    /// counter.
    async fn get_or_create_search(&self, criteria: &SearchCriteria) -> Result<SearchId>;

    /// Number of job records already attached to this search.
    async fn count_jobs_for_search(&self, search_id: SearchId) -> Result<u64>;

    /// Reset `seen` on every record of the search ahead of a fresh pass.
    /// Returns the number of records touched.
    async fn mark_search_unseen(&self, search_id: SearchId) -> Result<u64>;

    /// Deactivate records the pass did not revisit: any still-unseen record
    /// of the search gets `active = false`. Returns the number retired.
    async fn retire_unseen(&self, search_id: SearchId) -> Result<u64>;

    /// Insert or update by `job_id`, marking the record seen and active.
    async fn upsert_job(&self, job: &JobDetails, search_id: SearchId) -> Result<()>;

    /// All records attached to this search, sentinel values mapped back
    /// to absent.
    async fn list_jobs_for_search(&self, search_id: SearchId) -> Result<Vec<JobDetails>>;
}
