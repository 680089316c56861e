//! CSV input: one row per search to run.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::types::SearchCriteria;

#[derive(Debug, Clone, Deserialize)]
pub struct InputRow {
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Software")]
    pub software: Option<String>,
    #[serde(rename = "Limit")]
    pub limit: Option<String>,
}

impl InputRow {
    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            job_title: self.role.trim().to_string(),
            location: self.location.trim().to_string(),
            domain: self.domain.trim().to_string(),
            software: self
                .software
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }

    /// Parse the per-row job limit. An unparseable value is logged and
    /// treated as no limit.
    pub fn job_limit(&self) -> Option<u64> {
        let raw = self.limit.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        match raw.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                tracing::warn!(limit = raw, role = %self.role, "unparseable job limit, ignoring");
                None
            }
        }
    }
}

pub fn read_input(path: &Path) -> Result<Vec<InputRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<InputRow>().enumerate() {
        let row = record.with_context(|| format!("bad input row {}", i + 2))?;
        if row.role.trim().is_empty() || row.location.trim().is_empty() {
            tracing::warn!(row = i + 2, "skipping input row without role or location");
            continue;
        }
        rows.push(row);
    }
    if rows.is_empty() {
        anyhow::bail!("input file {} contains no usable rows", path.display());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(limit: Option<&str>, software: Option<&str>) -> InputRow {
        InputRow {
            role: "Data Engineer".into(),
            location: "Minneapolis, MN".into(),
            domain: "Tech".into(),
            software: software.map(String::from),
            limit: limit.map(String::from),
        }
    }

    #[test]
    fn limit_parses_or_falls_back() {
        assert_eq!(row(Some("50"), None).job_limit(), Some(50));
        assert_eq!(row(Some("lots"), None).job_limit(), None);
        assert_eq!(row(Some(""), None).job_limit(), None);
        assert_eq!(row(None, None).job_limit(), None);
    }

    #[test]
    fn criteria_trims_and_drops_blank_software() {
        let c = row(None, Some("  Snowflake  ")).criteria();
        assert_eq!(c.software.as_deref(), Some("Snowflake"));
        assert!(row(None, Some("   ")).criteria().software.is_none());
    }

    #[test]
    fn reads_rows_from_csv() {
        let dir = std::env::temp_dir();
        let path = dir.join("harvester_input_test.csv");
        std::fs::write(
            &path,
            "Role,Location,Domain,Software,Limit\n\
             Data Engineer,\"Minneapolis, MN\",Tech,Snowflake,25\n\
             ,,Tech,,\n\
             Analyst,Remote,Finance,,\n",
        )
        .unwrap();

        let rows = read_input(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, "Data Engineer");
        assert_eq!(rows[0].job_limit(), Some(25));
        assert_eq!(rows[1].criteria().location, "Remote");

        std::fs::remove_file(path).ok();
    }
}
