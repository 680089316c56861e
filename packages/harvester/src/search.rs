//! Drive the job search form and land on a results URL.

use anyhow::{bail, Result};
use scraper::Html;

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::pacing::{Pacer, RetryConfig};
use crate::selectors;
use crate::types::SearchCriteria;

const TITLE_FIELD: &str = "input[aria-label='Search by title, skill, or company']";
const LOCATION_FIELD: &str = "input[aria-label='City, state, or zip code']";
const SEARCH_BUTTON: &str = "button.jobs-search-box__submit-button";

/// The query string typed into the title field. A software qualifier is
/// prepended so results skew toward that tool.
pub fn compose_query(criteria: &SearchCriteria) -> String {
    match criteria.software.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(software) => format!("{}, {}", software.trim(), criteria.job_title),
        None => criteria.job_title.clone(),
    }
}

pub struct SearchNavigator<'a> {
    browser: &'a BrowserSession,
    pacer: &'a Pacer,
    config: &'a Config,
    retries: RetryConfig,
}

impl<'a> SearchNavigator<'a> {
    pub fn new(browser: &'a BrowserSession, pacer: &'a Pacer, config: &'a Config) -> Self {
        Self {
            browser,
            pacer,
            config,
            retries: RetryConfig::default(),
        }
    }

    /// Submit a search and return the results URL, or `None` when the site
    /// reports no matching jobs for this criteria.
    pub async fn run(&self, criteria: &SearchCriteria) -> Result<Option<String>> {
        let query = compose_query(criteria);
        tracing::info!(query, location = %criteria.location, "running search");

        self.browser.goto(&self.config.jobs_url())?;
        self.pacer.pause(self.pacer.delays.page_settle).await;

        self.fill_title_field(&query).await?;
        self.fill_location_field(&criteria.location).await?;
        self.submit().await?;

        let url = self.browser.current_url();
        if !url.contains("jobs/search") {
            bail!("search did not land on a results page (at {url})");
        }

        let html = Html::parse_document(&self.browser.content()?);
        if selectors::any_present(&html, selectors::NO_RESULTS_BANNER) {
            tracing::info!(query, "no matching jobs for search");
            return Ok(None);
        }

        Ok(Some(url))
    }

    /// The title input sometimes swallows the first keystrokes while the
    /// page is still hydrating, so typing is verified and retried.
    async fn fill_title_field(&self, query: &str) -> Result<()> {
        for attempt in 1..=self.retries.title_field_attempts {
            self.browser
                .type_slowly(TITLE_FIELD, query, self.pacer.delays.typing_char)
                .await?;
            self.pacer.pause(self.pacer.delays.general).await;

            let typed = self
                .browser
                .eval_string(&format!(
                    "document.querySelector({}).value",
                    serde_json::to_string(TITLE_FIELD)?
                ))?
                .unwrap_or_default();
            if typed == query {
                return Ok(());
            }
            tracing::warn!(attempt, expected = query, actual = typed, "title field mismatch, retrying");
            self.pacer.pause(self.pacer.delays.error_retry).await;
        }
        bail!("could not fill the search title field")
    }

    async fn fill_location_field(&self, location: &str) -> Result<()> {
        self.browser
            .type_slowly(LOCATION_FIELD, location, self.pacer.delays.typing_char)
            .await?;
        self.pacer.pause(self.pacer.delays.general).await;
        Ok(())
    }

    async fn submit(&self) -> Result<()> {
        if self.browser.click(SEARCH_BUTTON).is_err() {
            // Some layouts hide the button; Enter from the location field
            // submits the same form.
            self.browser.press_enter()?;
        }
        self.pacer.pause(self.pacer.delays.page_settle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(software: Option<&str>) -> SearchCriteria {
        SearchCriteria {
            job_title: "Data Engineer".into(),
            location: "Minneapolis, MN".into(),
            domain: "Tech".into(),
            software: software.map(String::from),
        }
    }

    #[test]
    fn software_prefixes_the_query() {
        assert_eq!(
            compose_query(&criteria(Some("Snowflake"))),
            "Snowflake, Data Engineer"
        );
    }

    #[test]
    fn blank_software_is_ignored() {
        assert_eq!(compose_query(&criteria(Some("  "))), "Data Engineer");
        assert_eq!(compose_query(&criteria(None)), "Data Engineer");
    }
}
