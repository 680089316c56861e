//! Job detail extraction.
//!
//! `parse_detail` is a pure function over the serialized page so the field
//! mapping is testable with fixture HTML. The async wrapper around it
//! handles navigation, the external apply URL, the company logo, and the
//! language-model enrichment pass.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use scraper::Html;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::BrowserSession;
use crate::enrich::Enricher;
use crate::pacing::Pacer;
use crate::selectors;
use crate::types::{JobDetails, SearchCriteria};

/// One result card: enough to reach the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    pub job_id: String,
    pub detail_url: String,
}

/// Pull the job cards out of a results page. Cards without a resolvable
/// job id are skipped; a job id is visited at most once per page even when
/// the list repeats it.
pub fn parse_cards(html: &Html, base_url: &str) -> Vec<CardInfo> {
    let mut cards = Vec::new();
    let mut seen_ids = HashSet::new();
    for chain_entry in selectors::JOB_CARDS {
        let Ok(card_selector) = scraper::Selector::parse(chain_entry) else {
            continue;
        };
        for card in html.select(&card_selector) {
            let href = selectors::CARD_LINK.iter().find_map(|raw| {
                let link = scraper::Selector::parse(raw).ok()?;
                card.select(&link).next()?.value().attr("href").map(String::from)
            });
            let Some(href) = href else { continue };
            let Some(job_id) = job_id_from_href(&href) else {
                continue;
            };
            if !seen_ids.insert(job_id.clone()) {
                continue;
            }
            let detail_url = if href.starts_with("http") {
                href
            } else {
                format!("{}{}", base_url.trim_end_matches('/'), href)
            };
            cards.push(CardInfo { job_id, detail_url });
        }
        if !cards.is_empty() {
            break;
        }
    }
    cards
}

/// Job ids appear either as a `currentJobId` query parameter or as the
/// numeric path segment after `/jobs/view/`.
pub fn job_id_from_href(href: &str) -> Option<String> {
    if let Some(idx) = href.find("currentJobId=") {
        let rest = &href[idx + "currentJobId=".len()..];
        let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !id.is_empty() {
            return Some(id);
        }
    }
    if let Some(idx) = href.find("/jobs/view/") {
        let rest = &href[idx + "/jobs/view/".len()..];
        let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !id.is_empty() {
            return Some(id);
        }
    }
    None
}

const EMPLOYMENT_TYPES: &[&str] = &[
    "full-time",
    "part-time",
    "contract",
    "temporary",
    "internship",
    "volunteer",
];
const WORK_MODES: &[&str] = &["remote", "hybrid", "on-site", "onsite"];
const SENIORITY_LEVELS: &[&str] = &[
    "internship",
    "entry level",
    "associate",
    "mid-senior level",
    "director",
    "executive",
];

/// Map the job detail document to a record. Missing fields stay `None`.
pub fn parse_detail(html: &Html, job_id: &str, criteria: &SearchCriteria) -> JobDetails {
    let mut job = JobDetails::new(Some(criteria.domain.clone()), criteria.software.clone());
    job.job_id = Some(job_id.to_string());
    job.title = selectors::first_text(html, selectors::DETAIL_TITLE);
    job.company = selectors::first_text(html, selectors::DETAIL_COMPANY);

    // The tertiary line mixes location, posted date, and applicant count
    // as sibling spans; classify each by content.
    let now = Utc::now();
    for span in selectors::all_texts(html, selectors::DETAIL_TERTIARY) {
        let lower = span.to_lowercase();
        if lower.contains("applicant") {
            job.applicants.get_or_insert(span);
        } else if lower.contains("ago") || lower.contains("reposted") {
            job.posted_date
                .get_or_insert_with(|| normalize_posted_date(&span, now));
        } else if !lower.contains('·') && job.location.is_none() {
            job.location = Some(span);
        }
    }

    for pill in selectors::all_texts(html, selectors::DETAIL_PILLS) {
        let lower = pill.to_lowercase();
        if job.employment_type.is_none() && EMPLOYMENT_TYPES.iter().any(|k| lower.contains(k)) {
            job.employment_type = Some(pill);
        } else if job.work_mode.is_none() && WORK_MODES.iter().any(|k| lower.contains(k)) {
            job.work_mode = Some(pill);
        } else if job.seniority.is_none() && SENIORITY_LEVELS.iter().any(|k| lower.contains(k)) {
            job.seniority = Some(pill);
        }
    }

    job.salary = selectors::all_texts(html, selectors::DETAIL_SALARY)
        .into_iter()
        .find(|t| t.contains("/yr") || t.contains("/hr"));

    job.apply_label = selectors::first_text(html, selectors::DETAIL_APPLY_BUTTON);
    job.description = selectors::first_text(html, selectors::DETAIL_DESCRIPTION);
    job.company_description = selectors::first_text(html, selectors::DETAIL_COMPANY_DESCRIPTION);
    job.location = job.location.or_else(|| Some(criteria.location.clone()));
    job
}

/// Collapse relative postings into an absolute date by subtracting the
/// stated offset from `now`, so "23 hours ago" just after midnight lands
/// on yesterday. Week and month granularity and "reposted" wordings pass
/// through unchanged.
pub fn normalize_posted_date(text: &str, now: DateTime<Utc>) -> String {
    let lower = text.to_lowercase();
    if lower.contains("reposted") || lower.contains("week") || lower.contains("month") {
        return text.trim().to_string();
    }

    let number = lower
        .split_whitespace()
        .find_map(|w| w.parse::<i64>().ok())
        .unwrap_or(0);

    let posted = if lower.contains("minute") || lower.contains("just now") {
        now - ChronoDuration::minutes(number)
    } else if lower.contains("hour") {
        now - ChronoDuration::hours(number)
    } else if lower.contains("day") {
        now - ChronoDuration::days(number)
    } else {
        return text.trim().to_string();
    };
    posted.format("%Y-%m-%d").to_string()
}

/// File-name-safe company slug for logo files.
fn sanitize_company(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub struct Extractor<'a> {
    browser: &'a BrowserSession,
    pacer: &'a Pacer,
    http: &'a reqwest::Client,
    enricher: Option<&'a Enricher>,
    logo_dir: PathBuf,
    base_url: String,
}

impl<'a> Extractor<'a> {
    pub fn new(
        browser: &'a BrowserSession,
        pacer: &'a Pacer,
        http: &'a reqwest::Client,
        enricher: Option<&'a Enricher>,
        logo_dir: PathBuf,
        base_url: String,
    ) -> Self {
        Self {
            browser,
            pacer,
            http,
            enricher,
            logo_dir,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn browser(&self) -> &BrowserSession {
        self.browser
    }

    /// Visit one card's detail view and assemble the full record.
    pub async fn extract_job(
        &self,
        card: &CardInfo,
        criteria: &SearchCriteria,
    ) -> Result<JobDetails> {
        self.browser.goto(&card.detail_url)?;
        for chain_entry in selectors::DETAIL_DESCRIPTION {
            if self
                .browser
                .wait_for(chain_entry, Duration::from_secs(5))
                .is_ok()
            {
                break;
            }
        }
        self.pacer.pause(self.pacer.delays.page_settle).await;
        // The lower detail sections load lazily as they scroll into view.
        self.browser.scroll_page().await?;

        let html = Html::parse_document(&self.browser.content()?);
        let mut job = parse_detail(&html, &card.job_id, criteria);
        let logo_url = selectors::first_attr(&html, selectors::DETAIL_LOGO, "src");
        drop(html);

        self.capture_apply_url(&mut job).await;

        if let (Some(url), Some(company)) = (logo_url, job.company.as_deref()) {
            match self.download_logo(&url, company, &card.job_id).await {
                Ok(path) => job.logo_path = Some(path.display().to_string()),
                Err(e) => tracing::warn!(job_id = %card.job_id, error = %e, "logo download failed"),
            }
        }

        if let (Some(enricher), Some(description)) = (self.enricher, job.description.clone()) {
            job.enrichment = enricher.enrich(&description).await;
            job.llm_converted = !job.enrichment.is_empty();
        }

        Ok(job)
    }

    /// Click through to the external application page in a popup tab and
    /// record its URL. One-click in-site applications have no external
    /// destination and are skipped. Failures leave the field empty.
    async fn capture_apply_url(&self, job: &mut JobDetails) {
        if job.apply_label.as_deref() == Some("Easy Apply") {
            return;
        }
        let Some(button) = selectors::DETAIL_APPLY_BUTTON
            .iter()
            .find(|s| self.browser.click(s).is_ok())
        else {
            return;
        };
        tracing::debug!(selector = button, "clicked apply button");
        self.pacer.pause(self.pacer.delays.after_click).await;

        match self.browser.capture_popup_url(Duration::from_secs(10)).await {
            Ok(Some(url)) => job.apply_url = Some(url),
            Ok(None) => tracing::debug!("no external apply tab appeared"),
            Err(e) => tracing::warn!(error = %e, "failed to capture apply url"),
        }
    }

    async fn download_logo(&self, url: &str, company: &str, job_id: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.logo_dir)
            .await
            .with_context(|| format!("failed to create {}", self.logo_dir.display()))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("logo request failed")?
            .error_for_status()
            .context("logo request returned an error status")?;
        let bytes = response.bytes().await.context("failed to read logo body")?;

        let path = logo_path(&self.logo_dir, company, job_id);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

fn logo_path(dir: &Path, company: &str, job_id: &str) -> PathBuf {
    dir.join(format!("{}_{}.png", sanitize_company(company), job_id))
}
