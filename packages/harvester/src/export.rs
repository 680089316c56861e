//! CSV export of the records a run accepted.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::types::{or_sentinel, JobDetails};

/// Flat row shape written to the export file. Absent fields carry the
/// sentinel so the sheet has no holes.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub posted_date: String,
    pub applicants: String,
    pub salary: String,
    pub full_job_description: String,
    pub industry: String,
    pub tech_skills: String,
    pub benefits: String,
    pub qualifications: String,
    pub contract_duration: String,
    pub expected_hours_per_week: String,
    pub required_skills: String,
    pub scraped_date: String,
    pub llm_converted: bool,
}

impl From<&JobDetails> for ExportRow {
    fn from(job: &JobDetails) -> Self {
        Self {
            job_id: or_sentinel(job.job_id.as_deref()),
            title: or_sentinel(job.title.as_deref()),
            company: or_sentinel(job.company.as_deref()),
            location: or_sentinel(job.location.as_deref()),
            job_type: or_sentinel(job.employment_type.as_deref()),
            posted_date: or_sentinel(job.posted_date.as_deref()),
            applicants: or_sentinel(job.applicants.as_deref()),
            salary: or_sentinel(job.salary.as_deref()),
            full_job_description: or_sentinel(job.description.as_deref()),
            industry: or_sentinel(job.enrichment.industry.as_deref()),
            tech_skills: or_sentinel(job.enrichment.tech_skills.as_deref()),
            benefits: or_sentinel(job.enrichment.benefits.as_deref()),
            qualifications: or_sentinel(job.enrichment.qualifications.as_deref()),
            contract_duration: or_sentinel(job.enrichment.contract_duration.as_deref()),
            expected_hours_per_week: or_sentinel(job.enrichment.expected_hours_per_week.as_deref()),
            required_skills: or_sentinel(job.enrichment.required_skills.as_deref()),
            scraped_date: job.extracted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            llm_converted: job.llm_converted,
        }
    }
}

pub fn write_export(path: &Path, jobs: &[JobDetails]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;

    for job in jobs {
        writer
            .serialize(ExportRow::from(job))
            .context("failed to write export row")?;
    }
    writer.flush().context("failed to flush export file")?;
    tracing::info!(count = jobs.len(), path = %path.display(), "wrote export");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_export_as_sentinel() {
        let mut job = JobDetails::new(Some("Tech".into()), None);
        job.job_id = Some("42".into());
        job.title = Some("Engineer".into());

        let row = ExportRow::from(&job);
        assert_eq!(row.job_id, "42");
        assert_eq!(row.title, "Engineer");
        assert_eq!(row.company, "Not Applicable");
        assert_eq!(row.salary, "Not Applicable");
        assert!(!row.llm_converted);
    }

    #[test]
    fn export_file_round_trips_headers() {
        let path = std::env::temp_dir().join("harvester_export_test.csv");
        let mut job = JobDetails::new(None, None);
        job.job_id = Some("7".into());
        write_export(&path, &[job]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        for column in [
            "job_id",
            "full_job_description",
            "expected_hours_per_week",
            "scraped_date",
            "llm_converted",
        ] {
            assert!(header.contains(column), "missing column {column}");
        }

        std::fs::remove_file(path).ok();
    }
}
