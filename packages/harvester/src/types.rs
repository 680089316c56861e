use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Literal written in place of an absent field when a record is persisted
/// or exported. Inside the pipeline absent values stay `None`.
pub const NOT_APPLICABLE: &str = "Not Applicable";

/// Substitute the sentinel for an absent or empty value.
pub fn or_sentinel(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => NOT_APPLICABLE.to_string(),
    }
}

/// Inverse of [`or_sentinel`], used when reading persisted rows back.
pub fn from_sentinel(value: String) -> Option<String> {
    if value.trim().is_empty() || value == NOT_APPLICABLE {
        None
    } else {
        Some(value)
    }
}

/// Unique identifier for a tracked search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchId(pub Uuid);

impl SearchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SearchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One query triple tracked across repeated runs. `(job_title, location,
/// software)` is unique in the store; re-running the same triple increments
/// its iteration counter instead of creating a new row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub job_title: String,
    pub location: String,
    pub domain: String,
    pub software: Option<String>,
}

impl SearchCriteria {
    /// The software column participates in the unique triple, so an absent
    /// qualifier is stored as an empty string rather than NULL.
    pub fn software_key(&self) -> &str {
        self.software.as_deref().unwrap_or("")
    }
}

/// Fields produced by the language-model pass over the raw description.
/// Every field is optional; a failed or partial enrichment leaves the
/// missing ones `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub industry: Option<String>,
    pub tech_skills: Option<String>,
    pub benefits: Option<String>,
    pub qualifications: Option<String>,
    pub contract_duration: Option<String>,
    pub expected_hours_per_week: Option<String>,
    pub required_skills: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.industry.is_none()
            && self.tech_skills.is_none()
            && self.benefits.is_none()
            && self.qualifications.is_none()
            && self.contract_duration.is_none()
            && self.expected_hours_per_week.is_none()
            && self.required_skills.is_none()
    }
}

/// Everything scraped from one job detail view. Fields the page did not
/// yield stay `None`; the sentinel is applied only at the storage/export
/// boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobDetails {
    pub job_id: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub work_mode: Option<String>,
    pub seniority: Option<String>,
    pub salary: Option<String>,
    pub posted_date: Option<String>,
    pub applicants: Option<String>,
    pub apply_label: Option<String>,
    pub apply_url: Option<String>,
    pub company_description: Option<String>,
    pub logo_path: Option<String>,
    pub description: Option<String>,
    pub enrichment: Enrichment,
    pub domain: Option<String>,
    pub software: Option<String>,
    pub llm_converted: bool,
    pub extracted_at: DateTime<Utc>,
}

impl JobDetails {
    pub fn new(domain: Option<String>, software: Option<String>) -> Self {
        Self {
            domain,
            software,
            extracted_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Names of the essential fields this record is missing. An empty
    /// result means the record passes the acceptance gate.
    pub fn missing_essentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let absent = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if absent(&self.job_id) {
            missing.push("job_id");
        }
        if absent(&self.title) {
            missing.push("title");
        }
        if absent(&self.company) {
            missing.push("company");
        }
        if absent(&self.description) {
            missing.push("description");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_job() -> JobDetails {
        JobDetails {
            job_id: Some("4012345678".into()),
            title: Some("Data Engineer".into()),
            company: Some("Acme".into()),
            description: Some("Build pipelines.".into()),
            ..JobDetails::new(Some("Tech".into()), Some("Python".into()))
        }
    }

    #[test]
    fn complete_record_passes_gate() {
        assert!(complete_job().missing_essentials().is_empty());
    }

    #[test]
    fn blank_description_fails_gate() {
        let mut job = complete_job();
        job.description = Some("   ".into());
        assert_eq!(job.missing_essentials(), vec!["description"]);
    }

    #[test]
    fn reports_every_missing_essential() {
        let job = JobDetails::new(None, None);
        assert_eq!(
            job.missing_essentials(),
            vec!["job_id", "title", "company", "description"]
        );
    }

    #[test]
    fn sentinel_applied_for_absent_and_blank() {
        assert_eq!(or_sentinel(None), NOT_APPLICABLE);
        assert_eq!(or_sentinel(Some("")), NOT_APPLICABLE);
        assert_eq!(or_sentinel(Some("Remote")), "Remote");
    }

    #[test]
    fn sentinel_round_trips_to_none() {
        assert_eq!(from_sentinel(NOT_APPLICABLE.to_string()), None);
        assert_eq!(from_sentinel(String::new()), None);
        assert_eq!(from_sentinel("Remote".to_string()), Some("Remote".to_string()));
    }
}
