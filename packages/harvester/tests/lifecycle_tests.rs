//! Lifecycle semantics of the storage seam, exercised against an
//! in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use harvester::storage::Storage;
use harvester::types::{JobDetails, SearchCriteria, SearchId};

#[derive(Debug, Clone)]
struct StoredJob {
    search_id: SearchId,
    title: String,
    seen: bool,
    active: bool,
    updates: u32,
}

#[derive(Default)]
struct MemoryStorage {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    searches: HashMap<(String, String, String), (SearchId, u64)>,
    jobs: HashMap<String, StoredJob>,
}

impl MemoryStorage {
    fn job(&self, job_id: &str) -> Option<StoredJob> {
        self.inner.lock().unwrap().jobs.get(job_id).cloned()
    }

    fn iteration(&self, criteria: &SearchCriteria) -> Option<u64> {
        let key = (
            criteria.job_title.clone(),
            criteria.location.clone(),
            criteria.software_key().to_string(),
        );
        self.inner.lock().unwrap().searches.get(&key).map(|(_, i)| *i)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_or_create_search(&self, criteria: &SearchCriteria) -> Result<SearchId> {
        let key = (
            criteria.job_title.clone(),
            criteria.location.clone(),
            criteria.software_key().to_string(),
        );
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .searches
            .entry(key)
            .and_modify(|(_, i)| *i += 1)
            .or_insert((SearchId::new(), 1));
        Ok(entry.0)
    }

    async fn count_jobs_for_search(&self, search_id: SearchId) -> Result<u64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .values()
            .filter(|j| j.search_id == search_id)
            .count() as u64)
    }

    async fn mark_search_unseen(&self, search_id: SearchId) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut touched = 0;
        for job in inner.jobs.values_mut().filter(|j| j.search_id == search_id) {
            job.seen = false;
            touched += 1;
        }
        Ok(touched)
    }

    async fn retire_unseen(&self, search_id: SearchId) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut retired = 0;
        for job in inner
            .jobs
            .values_mut()
            .filter(|j| j.search_id == search_id && !j.seen && j.active)
        {
            job.active = false;
            retired += 1;
        }
        Ok(retired)
    }

    async fn upsert_job(&self, job: &JobDetails, search_id: SearchId) -> Result<()> {
        let job_id = job.job_id.clone().expect("test job must carry an id");
        let title = job.title.clone().unwrap_or_default();
        let mut inner = self.inner.lock().unwrap();
        inner
            .jobs
            .entry(job_id)
            .and_modify(|stored| {
                stored.search_id = search_id;
                stored.title = title.clone();
                stored.seen = true;
                stored.active = true;
                stored.updates += 1;
            })
            .or_insert(StoredJob {
                search_id,
                title,
                seen: true,
                active: true,
                updates: 0,
            });
        Ok(())
    }

    async fn list_jobs_for_search(&self, search_id: SearchId) -> Result<Vec<JobDetails>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .iter()
            .filter(|(_, j)| j.search_id == search_id)
            .map(|(id, j)| JobDetails {
                job_id: Some(id.clone()),
                title: Some(j.title.clone()),
                ..JobDetails::default()
            })
            .collect())
    }
}

fn criteria() -> SearchCriteria {
    SearchCriteria {
        job_title: "Data Engineer".into(),
        location: "Minneapolis, MN".into(),
        domain: "Tech".into(),
        software: Some("Snowflake".into()),
    }
}

fn job(id: &str, title: &str) -> JobDetails {
    JobDetails {
        job_id: Some(id.into()),
        title: Some(title.into()),
        company: Some("Acme".into()),
        description: Some("Build pipelines.".into()),
        ..JobDetails::new(Some("Tech".into()), Some("Snowflake".into()))
    }
}

#[tokio::test]
async fn upsert_by_job_id_updates_instead_of_duplicating() {
    let storage = MemoryStorage::default();
    let search_id = storage.get_or_create_search(&criteria()).await.unwrap();

    storage.upsert_job(&job("1", "Engineer"), search_id).await.unwrap();
    storage.upsert_job(&job("1", "Engineer II"), search_id).await.unwrap();

    assert_eq!(storage.count_jobs_for_search(search_id).await.unwrap(), 1);
    let stored = storage.job("1").unwrap();
    assert_eq!(stored.title, "Engineer II");
    assert_eq!(stored.updates, 1);
}

#[tokio::test]
async fn rescrape_retires_unrevisited_jobs() {
    let storage = MemoryStorage::default();
    let search_id = storage.get_or_create_search(&criteria()).await.unwrap();

    // First pass sees two jobs.
    storage.upsert_job(&job("1", "A"), search_id).await.unwrap();
    storage.upsert_job(&job("2", "B"), search_id).await.unwrap();

    // Second pass only revisits job 1.
    assert_eq!(storage.mark_search_unseen(search_id).await.unwrap(), 2);
    storage.upsert_job(&job("1", "A"), search_id).await.unwrap();
    assert_eq!(storage.retire_unseen(search_id).await.unwrap(), 1);

    let revisited = storage.job("1").unwrap();
    assert!(revisited.seen && revisited.active);
    let stale = storage.job("2").unwrap();
    assert!(!stale.seen);
    assert!(!stale.active);
}

#[tokio::test]
async fn retiring_twice_is_idempotent() {
    let storage = MemoryStorage::default();
    let search_id = storage.get_or_create_search(&criteria()).await.unwrap();

    storage.upsert_job(&job("1", "A"), search_id).await.unwrap();
    storage.mark_search_unseen(search_id).await.unwrap();
    assert_eq!(storage.retire_unseen(search_id).await.unwrap(), 1);
    assert_eq!(storage.retire_unseen(search_id).await.unwrap(), 0);
}

#[tokio::test]
async fn reupserting_a_retired_job_reactivates_it() {
    let storage = MemoryStorage::default();
    let search_id = storage.get_or_create_search(&criteria()).await.unwrap();

    storage.upsert_job(&job("1", "A"), search_id).await.unwrap();
    storage.mark_search_unseen(search_id).await.unwrap();
    storage.retire_unseen(search_id).await.unwrap();
    assert!(!storage.job("1").unwrap().active);

    storage.upsert_job(&job("1", "A"), search_id).await.unwrap();
    let stored = storage.job("1").unwrap();
    assert!(stored.seen && stored.active);
}

#[tokio::test]
async fn repeated_searches_share_an_id_and_count_iterations() {
    let storage = MemoryStorage::default();
    let first = storage.get_or_create_search(&criteria()).await.unwrap();
    let second = storage.get_or_create_search(&criteria()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(storage.iteration(&criteria()), Some(2));

    // A different software qualifier is a different search.
    let mut other = criteria();
    other.software = None;
    let third = storage.get_or_create_search(&other).await.unwrap();
    assert_ne!(first, third);
}

#[tokio::test]
async fn job_cap_bounds_persisted_records_for_a_search() {
    use harvester::paginate::JobCap;

    let storage = MemoryStorage::default();
    let search_id = storage.get_or_create_search(&criteria()).await.unwrap();
    let mut cap = JobCap::new(Some(5));

    // The paginator persists a record then counts it against the cap.
    for i in 0..20 {
        if cap.reached() {
            break;
        }
        storage
            .upsert_job(&job(&i.to_string(), "Engineer"), search_id)
            .await
            .unwrap();
        cap.record();
    }

    assert_eq!(storage.count_jobs_for_search(search_id).await.unwrap(), 5);
    let listed = storage.list_jobs_for_search(search_id).await.unwrap();
    assert_eq!(listed.len(), 5);
    assert!(listed.iter().all(|j| j.job_id.is_some()));
}

#[tokio::test]
async fn searches_do_not_leak_jobs_into_each_other() {
    let storage = MemoryStorage::default();
    let snowflake = storage.get_or_create_search(&criteria()).await.unwrap();
    let mut other_criteria = criteria();
    other_criteria.software = Some("dbt".into());
    let dbt = storage.get_or_create_search(&other_criteria).await.unwrap();

    storage.upsert_job(&job("1", "A"), snowflake).await.unwrap();
    storage.upsert_job(&job("2", "B"), dbt).await.unwrap();

    assert_eq!(storage.mark_search_unseen(snowflake).await.unwrap(), 1);
    assert_eq!(storage.retire_unseen(dbt).await.unwrap(), 0);
    assert!(storage.job("2").unwrap().active);
}
