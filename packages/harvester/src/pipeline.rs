//! End-to-end run: login once, then for each input row search, paginate,
//! extract, persist, and reconcile the seen/active lifecycle.

use anyhow::{Context, Result};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::enrich::Enricher;
use crate::extract::Extractor;
use crate::input::InputRow;
use crate::pacing::Pacer;
use crate::paginate::{JobCap, Paginator, PaginatorConfig};
use crate::proxy::ProxyRotator;
use crate::search::SearchNavigator;
use crate::session::Authenticator;
use crate::storage::Storage;
use crate::types::JobDetails;

pub struct Pipeline<'a> {
    browser: &'a BrowserSession,
    storage: &'a dyn Storage,
    config: &'a Config,
    pacer: Pacer,
    rotator: Option<ProxyRotator>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        browser: &'a BrowserSession,
        storage: &'a dyn Storage,
        config: &'a Config,
        rotator: Option<ProxyRotator>,
    ) -> Self {
        Self {
            browser,
            storage,
            config,
            pacer: Pacer::default(),
            rotator,
        }
    }

    /// Run every input row. A login failure aborts the whole run; a failed
    /// row is logged and the remaining rows still run. Returns all accepted
    /// records for export.
    pub async fn run(&mut self, rows: &[InputRow]) -> Result<Vec<JobDetails>> {
        let mut rotator = self.rotator.take();

        Authenticator::new(self.browser, &self.pacer, self.config)
            .login()
            .await
            .context("login failed, aborting run")?;

        let http = reqwest::Client::new();
        let enricher = Enricher::new(
            openai_client::OpenAIClient::new(self.config.openai_api_key.clone()),
            self.config.openai_model.clone(),
        );
        let extractor = Extractor::new(
            self.browser,
            &self.pacer,
            &http,
            Some(&enricher),
            self.config.logo_dir.clone(),
            self.config.base_url.clone(),
        );

        let mut all_accepted = Vec::new();
        for row in rows {
            match self.run_row(row, &extractor, rotator.as_mut()).await {
                Ok(mut accepted) => all_accepted.append(&mut accepted),
                Err(e) => {
                    tracing::error!(role = %row.role, location = %row.location, error = %e, "search row failed");
                }
            }
            self.pacer.pause(self.pacer.delays.between_pages).await;
        }

        self.rotator = rotator;
        Ok(all_accepted)
    }

    async fn run_row(
        &self,
        row: &InputRow,
        extractor: &Extractor<'_>,
        rotator: Option<&mut ProxyRotator>,
    ) -> Result<Vec<JobDetails>> {
        let criteria = row.criteria();
        let search_id = self.storage.get_or_create_search(&criteria).await?;

        // Records from earlier passes start unseen; whatever this pass does
        // not revisit gets retired afterwards.
        let existing = self.storage.count_jobs_for_search(search_id).await?;
        if existing > 0 {
            let reset = self.storage.mark_search_unseen(search_id).await?;
            tracing::info!(search_id = %search_id, reset, "reset seen flags for rescrape");
        }

        let navigator = SearchNavigator::new(self.browser, &self.pacer, self.config);
        let Some(results_url) = navigator.run(&criteria).await? else {
            tracing::info!(role = %row.role, "search yielded no results, moving on");
            return Ok(Vec::new());
        };

        let mut cap = JobCap::new(row.job_limit());
        let paginator = Paginator::new(
            extractor,
            &self.pacer,
            self.storage,
            PaginatorConfig::default(),
        );
        let accepted = paginator
            .process_results(&results_url, &criteria, search_id, &mut cap, rotator)
            .await?;

        let retired = self.storage.retire_unseen(search_id).await?;
        tracing::info!(
            search_id = %search_id,
            accepted = accepted.len(),
            retired,
            "search pass complete"
        );
        Ok(accepted)
    }
}
