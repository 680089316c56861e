//! PostgreSQL storage backend.
//!
//! Two tables: `search_criteria` tracks each query triple and its run
//! counter, `jobs` holds one row per job id with the seen/active lifecycle
//! flags. The schema bootstraps itself on connect so a fresh database
//! works without a separate migration step.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use super::Storage;
use crate::types::{from_sentinel, or_sentinel, Enrichment, JobDetails, SearchCriteria, SearchId};

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;

        let storage = Self { pool };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_criteria (
                id UUID PRIMARY KEY,
                job_title TEXT NOT NULL,
                location TEXT NOT NULL,
                domain TEXT NOT NULL,
                software TEXT NOT NULL DEFAULT '',
                iteration BIGINT NOT NULL DEFAULT 1,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (job_title, location, software)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create search_criteria table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                search_id UUID NOT NULL REFERENCES search_criteria(id),
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                employment_type TEXT NOT NULL,
                work_mode TEXT NOT NULL,
                seniority TEXT NOT NULL,
                salary TEXT NOT NULL,
                posted_date TEXT NOT NULL,
                applicants TEXT NOT NULL,
                apply_url TEXT NOT NULL,
                company_description TEXT NOT NULL,
                logo_path TEXT NOT NULL,
                full_job_description TEXT NOT NULL,
                industry TEXT NOT NULL,
                tech_skills TEXT NOT NULL,
                benefits TEXT NOT NULL,
                qualifications TEXT NOT NULL,
                contract_duration TEXT NOT NULL,
                expected_hours_per_week TEXT NOT NULL,
                required_skills TEXT NOT NULL,
                domain TEXT NOT NULL,
                software TEXT NOT NULL,
                llm_converted BOOLEAN NOT NULL DEFAULT FALSE,
                seen BOOLEAN NOT NULL DEFAULT TRUE,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                scraped_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create jobs table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_search_id ON jobs (search_id)")
            .execute(&self.pool)
            .await
            .context("failed to create jobs index")?;

        Ok(())
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn get_or_create_search(&self, criteria: &SearchCriteria) -> Result<SearchId> {
        let row = sqlx::query(
            r#"
            INSERT INTO search_criteria (id, job_title, location, domain, software)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (job_title, location, software) DO UPDATE
                SET iteration = search_criteria.iteration + 1,
                    updated_at = now()
            RETURNING id, iteration
            "#,
        )
        .bind(SearchId::new().0)
        .bind(&criteria.job_title)
        .bind(&criteria.location)
        .bind(&criteria.domain)
        .bind(criteria.software_key())
        .fetch_one(&self.pool)
        .await
        .context("failed to get or create search criteria")?;

        let id = SearchId(row.get("id"));
        let iteration: i64 = row.get("iteration");
        tracing::info!(search_id = %id, iteration, "resolved search criteria");
        Ok(id)
    }

    async fn count_jobs_for_search(&self, search_id: SearchId) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM jobs WHERE search_id = $1")
            .bind(search_id.0)
            .fetch_one(&self.pool)
            .await
            .context("failed to count jobs for search")?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }

    async fn mark_search_unseen(&self, search_id: SearchId) -> Result<u64> {
        let result = sqlx::query("UPDATE jobs SET seen = FALSE WHERE search_id = $1")
            .bind(search_id.0)
            .execute(&self.pool)
            .await
            .context("failed to mark search jobs unseen")?;
        Ok(result.rows_affected())
    }

    async fn retire_unseen(&self, search_id: SearchId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET active = FALSE, updated_at = now()
             WHERE search_id = $1 AND seen = FALSE AND active = TRUE",
        )
        .bind(search_id.0)
        .execute(&self.pool)
        .await
        .context("failed to retire unseen jobs")?;
        Ok(result.rows_affected())
    }

    /// Retried once: the pool re-establishes dropped connections, so a
    /// second attempt covers a database restart mid-run.
    async fn upsert_job(&self, job: &JobDetails, search_id: SearchId) -> Result<()> {
        match self.try_upsert_job(job, search_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "job save failed, retrying once");
                self.try_upsert_job(job, search_id).await
            }
        }
    }

    async fn list_jobs_for_search(&self, search_id: SearchId) -> Result<Vec<JobDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, title, company, location, employment_type, work_mode,
                   seniority, salary, posted_date, applicants, apply_url,
                   company_description, logo_path, full_job_description,
                   industry, tech_skills, benefits, qualifications,
                   contract_duration, expected_hours_per_week, required_skills,
                   domain, software, llm_converted, scraped_at
            FROM jobs
            WHERE search_id = $1
            ORDER BY scraped_at DESC
            "#,
        )
        .bind(search_id.0)
        .fetch_all(&self.pool)
        .await
        .context("failed to list jobs for search")?;

        Ok(rows
            .into_iter()
            .map(|r| JobDetails {
                job_id: Some(r.get("job_id")),
                title: from_sentinel(r.get("title")),
                company: from_sentinel(r.get("company")),
                location: from_sentinel(r.get("location")),
                employment_type: from_sentinel(r.get("employment_type")),
                work_mode: from_sentinel(r.get("work_mode")),
                seniority: from_sentinel(r.get("seniority")),
                salary: from_sentinel(r.get("salary")),
                posted_date: from_sentinel(r.get("posted_date")),
                applicants: from_sentinel(r.get("applicants")),
                apply_label: None,
                apply_url: from_sentinel(r.get("apply_url")),
                company_description: from_sentinel(r.get("company_description")),
                logo_path: from_sentinel(r.get("logo_path")),
                description: from_sentinel(r.get("full_job_description")),
                enrichment: Enrichment {
                    industry: from_sentinel(r.get("industry")),
                    tech_skills: from_sentinel(r.get("tech_skills")),
                    benefits: from_sentinel(r.get("benefits")),
                    qualifications: from_sentinel(r.get("qualifications")),
                    contract_duration: from_sentinel(r.get("contract_duration")),
                    expected_hours_per_week: from_sentinel(r.get("expected_hours_per_week")),
                    required_skills: from_sentinel(r.get("required_skills")),
                },
                domain: from_sentinel(r.get("domain")),
                software: from_sentinel(r.get("software")),
                llm_converted: r.get("llm_converted"),
                extracted_at: r.get("scraped_at"),
            })
            .collect())
    }
}

impl PostgresStorage {
    async fn try_upsert_job(&self, job: &JobDetails, search_id: SearchId) -> Result<()> {
        let job_id = job
            .job_id
            .as_deref()
            .context("job record has no job_id")?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                job_id, search_id, title, company, location, employment_type,
                work_mode, seniority, salary, posted_date, applicants, apply_url,
                company_description, logo_path, full_job_description,
                industry, tech_skills, benefits, qualifications, contract_duration,
                expected_hours_per_week, required_skills,
                domain, software, llm_converted, seen, active, scraped_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25,
                TRUE, TRUE, $26
            )
            ON CONFLICT (job_id) DO UPDATE SET
                search_id = EXCLUDED.search_id,
                title = EXCLUDED.title,
                company = EXCLUDED.company,
                location = EXCLUDED.location,
                employment_type = EXCLUDED.employment_type,
                work_mode = EXCLUDED.work_mode,
                seniority = EXCLUDED.seniority,
                salary = EXCLUDED.salary,
                posted_date = EXCLUDED.posted_date,
                applicants = EXCLUDED.applicants,
                apply_url = EXCLUDED.apply_url,
                company_description = EXCLUDED.company_description,
                logo_path = EXCLUDED.logo_path,
                full_job_description = EXCLUDED.full_job_description,
                industry = EXCLUDED.industry,
                tech_skills = EXCLUDED.tech_skills,
                benefits = EXCLUDED.benefits,
                qualifications = EXCLUDED.qualifications,
                contract_duration = EXCLUDED.contract_duration,
                expected_hours_per_week = EXCLUDED.expected_hours_per_week,
                required_skills = EXCLUDED.required_skills,
                domain = EXCLUDED.domain,
                software = EXCLUDED.software,
                llm_converted = EXCLUDED.llm_converted,
                seen = TRUE,
                active = TRUE,
                scraped_at = EXCLUDED.scraped_at,
                updated_at = now()
            "#,
        )
        .bind(job_id)
        .bind(search_id.0)
        .bind(or_sentinel(job.title.as_deref()))
        .bind(or_sentinel(job.company.as_deref()))
        .bind(or_sentinel(job.location.as_deref()))
        .bind(or_sentinel(job.employment_type.as_deref()))
        .bind(or_sentinel(job.work_mode.as_deref()))
        .bind(or_sentinel(job.seniority.as_deref()))
        .bind(or_sentinel(job.salary.as_deref()))
        .bind(or_sentinel(job.posted_date.as_deref()))
        .bind(or_sentinel(job.applicants.as_deref()))
        .bind(or_sentinel(job.apply_url.as_deref()))
        .bind(or_sentinel(job.company_description.as_deref()))
        .bind(or_sentinel(job.logo_path.as_deref()))
        .bind(or_sentinel(job.description.as_deref()))
        .bind(or_sentinel(job.enrichment.industry.as_deref()))
        .bind(or_sentinel(job.enrichment.tech_skills.as_deref()))
        .bind(or_sentinel(job.enrichment.benefits.as_deref()))
        .bind(or_sentinel(job.enrichment.qualifications.as_deref()))
        .bind(or_sentinel(job.enrichment.contract_duration.as_deref()))
        .bind(or_sentinel(job.enrichment.expected_hours_per_week.as_deref()))
        .bind(or_sentinel(job.enrichment.required_skills.as_deref()))
        .bind(or_sentinel(job.domain.as_deref()))
        .bind(or_sentinel(job.software.as_deref()))
        .bind(job.llm_converted)
        .bind(job.extracted_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to upsert job {job_id}"))?;

        Ok(())
    }
}
