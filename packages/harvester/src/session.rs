//! Account login and verification handling.
//!
//! The flow is a small state machine: submit the credential form, then poll
//! the page until either a logged-in indicator appears or the deadline
//! passes. A captcha or one-time-code challenge pauses the poll loop so a
//! human can complete it in the visible browser window.

use anyhow::{bail, Context, Result};
use scraper::Html;
use std::time::{Duration, Instant};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::pacing::Pacer;
use crate::selectors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    FormSubmitted,
    ChallengePending,
    Verified,
    LoggedIn,
    TimedOut,
}

pub struct Authenticator<'a> {
    browser: &'a BrowserSession,
    pacer: &'a Pacer,
    config: &'a Config,
}

impl<'a> Authenticator<'a> {
    pub fn new(browser: &'a BrowserSession, pacer: &'a Pacer, config: &'a Config) -> Self {
        Self {
            browser,
            pacer,
            config,
        }
    }

    /// Run the full login flow. Returns only in the `LoggedIn` state;
    /// a verification timeout or rejected credentials abort the run.
    pub async fn login(&self) -> Result<LoginState> {
        tracing::info!("starting login");

        self.browser.goto(&self.config.base_url)?;
        self.pacer.pause(self.pacer.delays.page_settle).await;
        self.dismiss_overlays();

        self.open_login_form().await?;
        self.submit_credentials().await?;

        let state = self.await_verification(LoginState::FormSubmitted).await?;
        match state {
            LoginState::LoggedIn => {
                tracing::info!("login complete");
                self.pacer.pause(self.pacer.delays.post_login).await;
                Ok(state)
            }
            LoginState::TimedOut => bail!("login verification timed out"),
            other => bail!("login ended in unexpected state {other:?}"),
        }
    }

    /// Close cookie banners or promo modals that cover the form.
    fn dismiss_overlays(&self) {
        for selector in ["button[aria-label='Dismiss']", "button.modal__dismiss"] {
            if self.browser.click(selector).is_ok() {
                tracing::debug!(selector, "dismissed overlay");
            }
        }
    }

    async fn open_login_form(&self) -> Result<()> {
        let candidates = ["a[href*='login']", "a.nav__button-secondary"];
        for selector in candidates {
            if self.browser.click(selector).is_ok() {
                self.pacer.pause(self.pacer.delays.page_settle).await;
                if self.on_login_form() {
                    return Ok(());
                }
            }
        }

        // Landing-page variants without a visible link.
        self.browser
            .goto(&format!("{}/login", self.config.base_url))?;
        self.pacer.pause(self.pacer.delays.page_settle).await;
        if self.on_login_form() {
            return Ok(());
        }
        bail!("could not reach the login form")
    }

    fn on_login_form(&self) -> bool {
        self.browser
            .wait_for("#username", Duration::from_secs(10))
            .is_ok()
    }

    async fn submit_credentials(&self) -> Result<()> {
        self.browser
            .type_slowly(
                "#username",
                &self.config.account_email,
                self.pacer.delays.typing_char,
            )
            .await
            .context("failed to fill email field")?;
        self.pacer.pause(self.pacer.delays.general).await;

        self.browser
            .type_slowly(
                "#password",
                &self.config.account_password,
                self.pacer.delays.typing_char,
            )
            .await
            .context("failed to fill password field")?;
        self.pacer.pause(self.pacer.delays.general).await;

        self.browser
            .click("button[type='submit']")
            .context("failed to submit login form")?;
        self.pacer.pause(self.pacer.delays.after_click).await;
        Ok(())
    }

    /// Poll until logged in or the verification deadline passes. Challenge
    /// pages keep the loop alive without counting as failure.
    async fn await_verification(&self, mut state: LoginState) -> Result<LoginState> {
        let deadline = Instant::now() + self.pacer.delays.verification_wait;

        loop {
            let html = Html::parse_document(&self.browser.content()?);

            if selectors::any_present(&html, selectors::LOGIN_CHALLENGE) {
                if state != LoginState::ChallengePending {
                    tracing::info!("verification challenge detected, waiting for manual completion");
                    state = LoginState::ChallengePending;
                }
            } else if selectors::any_present(&html, selectors::LOGIN_SUCCESS) {
                return Ok(LoginState::LoggedIn);
            } else if !self.browser.current_url().contains("login")
                && state != LoginState::Verified
            {
                // Off the login page but no nav indicator yet. Confirm by
                // loading the jobs hub, which requires a session.
                state = LoginState::Verified;
                self.browser.goto(&self.config.jobs_url())?;
                self.pacer.pause(self.pacer.delays.page_settle).await;
                continue;
            } else if state == LoginState::Verified
                && self.browser.current_url().contains("/jobs")
            {
                return Ok(LoginState::LoggedIn);
            }

            if Instant::now() >= deadline {
                return Ok(LoginState::TimedOut);
            }
            tokio::time::sleep(self.pacer.delays.verification_poll).await;
        }
    }
}
