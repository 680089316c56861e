//! Walk a search's result pages and feed each card through extraction.

use anyhow::Result;
use scraper::Html;
use url::Url;

use crate::extract::{parse_cards, CardInfo, Extractor};
use crate::pacing::Pacer;
use crate::proxy::{self, ProxyRotator};
use crate::storage::Storage;
use crate::types::{SearchCriteria, SearchId};

#[derive(Debug, Clone, Copy)]
pub struct PaginatorConfig {
    /// Results per page, matching the site's `start` offset stride.
    pub page_size: u32,
    /// Rotate the proxy after this many processed jobs.
    pub rotation_interval: u64,
    /// Attempts per card before it is skipped.
    pub card_attempts: usize,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            rotation_interval: 200,
            card_attempts: 2,
        }
    }
}

/// Bounds one search pass to the row's job limit.
#[derive(Debug, Clone, Copy)]
pub struct JobCap {
    pub limit: Option<u64>,
    pub processed: u64,
}

impl JobCap {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            processed: 0,
        }
    }

    pub fn reached(&self) -> bool {
        self.limit.is_some_and(|l| self.processed >= l)
    }

    pub fn record(&mut self) {
        self.processed += 1;
    }
}

/// The results URL for a given zero-based page, expressed through the
/// site's `start` offset parameter.
pub fn page_url(results_url: &str, page: u32, page_size: u32) -> Result<String> {
    let mut url = Url::parse(results_url)?;
    let start = page * page_size;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "start")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        if start > 0 {
            pairs.append_pair("start", &start.to_string());
        }
    }
    Ok(url.to_string())
}

pub struct Paginator<'a> {
    extractor: &'a Extractor<'a>,
    pacer: &'a Pacer,
    storage: &'a dyn Storage,
    config: PaginatorConfig,
}

impl<'a> Paginator<'a> {
    pub fn new(
        extractor: &'a Extractor<'a>,
        pacer: &'a Pacer,
        storage: &'a dyn Storage,
        config: PaginatorConfig,
    ) -> Self {
        Self {
            extractor,
            pacer,
            storage,
            config,
        }
    }

    /// Process result pages until the cap is hit, the pages run out, or
    /// results stop yielding cards. Returns the records that passed the
    /// acceptance gate, already persisted.
    pub async fn process_results(
        &self,
        results_url: &str,
        criteria: &SearchCriteria,
        search_id: SearchId,
        cap: &mut JobCap,
        rotator: Option<&mut ProxyRotator>,
    ) -> Result<Vec<crate::types::JobDetails>> {
        let mut accepted = Vec::new();
        let mut rotator = rotator;
        let mut total_since_rotation: u64 = 0;
        let mut page: u32 = 0;

        'pages: loop {
            if cap.reached() {
                break;
            }

            let url = page_url(results_url, page, self.config.page_size)?;
            tracing::info!(page, url = %url, "loading results page");

            let cards = self.load_cards(&url).await?;
            if cards.is_empty() {
                tracing::info!(page, "no cards on page, pagination complete");
                break;
            }

            for card in &cards {
                if cap.reached() {
                    break 'pages;
                }

                if let Some(rot) = rotator.as_mut() {
                    if total_since_rotation >= self.config.rotation_interval {
                        proxy::rotate(rot, self.extractor.browser(), self.pacer).await;
                        total_since_rotation = 0;
                    }
                }

                match self.process_card(card, criteria, search_id).await {
                    Ok(Some(job)) => {
                        cap.record();
                        total_since_rotation += 1;
                        accepted.push(job);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(job_id = %card.job_id, error = %e, "card failed, skipping");
                    }
                }
                self.pacer.pause(self.pacer.delays.between_jobs).await;
            }

            page += 1;
            self.pacer.pause(self.pacer.delays.between_pages).await;
        }

        Ok(accepted)
    }

    /// Load a page and parse its cards, refreshing once when the list
    /// renders empty. The result list is virtualized, so a scroll pass
    /// must run before the content is read or only the first cards exist.
    async fn load_cards(&self, url: &str) -> Result<Vec<CardInfo>> {
        self.extractor.browser().goto(url)?;
        self.pacer.pause(self.pacer.delays.page_settle).await;
        self.extractor.browser().scroll_page().await?;

        let html = Html::parse_document(&self.extractor.browser().content()?);
        let cards = parse_cards(&html, self.extractor.base_url());
        drop(html);
        if !cards.is_empty() {
            return Ok(cards);
        }

        tracing::warn!(url, "results list empty, refreshing once");
        self.extractor.browser().refresh()?;
        self.pacer.pause(self.pacer.delays.refresh_settle).await;
        self.extractor.browser().scroll_page().await?;

        let html = Html::parse_document(&self.extractor.browser().content()?);
        Ok(parse_cards(&html, self.extractor.base_url()))
    }

    /// Extract one card with bounded retries, gate on essential fields,
    /// and persist. `Ok(None)` means the record was rejected or skipped.
    async fn process_card(
        &self,
        card: &CardInfo,
        criteria: &SearchCriteria,
        search_id: SearchId,
    ) -> Result<Option<crate::types::JobDetails>> {
        let mut last_err = None;
        for attempt in 1..=self.config.card_attempts {
            match self.extractor.extract_job(card, criteria).await {
                Ok(job) => {
                    let missing = job.missing_essentials();
                    if !missing.is_empty() {
                        tracing::warn!(
                            job_id = %card.job_id,
                            missing = ?missing,
                            "record rejected, missing essential fields"
                        );
                        return Ok(None);
                    }
                    self.storage.upsert_job(&job, search_id).await?;
                    tracing::info!(job_id = %card.job_id, title = job.title.as_deref().unwrap_or_default(), "job saved");
                    return Ok(Some(job));
                }
                Err(e) => {
                    tracing::warn!(job_id = %card.job_id, attempt, error = %e, "extraction attempt failed");
                    last_err = Some(e);
                    self.pacer.pause(self.pacer.delays.error_retry).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("extraction failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_no_start_param() {
        let url = page_url("https://x.example/jobs/search/?keywords=rust", 0, 25).unwrap();
        assert!(!url.contains("start="));
        assert!(url.contains("keywords=rust"));
    }

    #[test]
    fn later_pages_offset_by_page_size() {
        let url = page_url("https://x.example/jobs/search/?keywords=rust", 2, 25).unwrap();
        assert!(url.contains("start=50"));
    }

    #[test]
    fn existing_start_param_is_replaced() {
        let url =
            page_url("https://x.example/jobs/search/?start=75&keywords=rust", 1, 25).unwrap();
        assert!(url.contains("start=25"));
        assert!(!url.contains("start=75"));
        assert!(url.contains("keywords=rust"));
    }

    #[test]
    fn cap_blocks_after_limit() {
        let mut cap = JobCap::new(Some(2));
        assert!(!cap.reached());
        cap.record();
        cap.record();
        assert!(cap.reached());
    }

    #[test]
    fn missing_limit_never_caps() {
        let mut cap = JobCap::new(None);
        for _ in 0..1000 {
            cap.record();
        }
        assert!(!cap.reached());
    }
}
