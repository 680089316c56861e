//! Thin wrapper over a headless Chrome session.
//!
//! One browser, one primary tab. The devtools calls are synchronous and the
//! pipeline runs as a single task, so the wrapper stays blocking and the
//! async pieces (slow typing, popup capture) sleep between the sync calls.

use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::seq::SliceRandom;
use rand::Rng;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
];

pub struct BrowserSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    /// Launch Chrome with anti-automation arguments, a randomized user
    /// agent, and optionally a proxy plus its auth extension.
    pub fn launch(
        headless: bool,
        proxy_arg: Option<String>,
        extension_dir: Option<&Path>,
    ) -> Result<Self> {
        let user_agent = {
            let mut rng = rand::thread_rng();
            USER_AGENTS
                .choose(&mut rng)
                .copied()
                .unwrap_or(USER_AGENTS[0])
        };
        tracing::debug!(user_agent, "launching browser");

        // Owned strings must outlive the OsStr args below.
        let ua_arg = format!("--user-agent={user_agent}");
        let proxy_flag = proxy_arg.map(|p| format!("--proxy-server={p}"));
        let extension_flag =
            extension_dir.map(|d| format!("--load-extension={}", d.display()));

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-notifications"),
            OsStr::new("--disable-popup-blocking"),
            OsStr::new("--start-maximized"),
            OsStr::new(&ua_arg),
        ];
        if let Some(flag) = proxy_flag.as_deref() {
            args.push(OsStr::new(flag));
        }
        if let Some(flag) = extension_flag.as_deref() {
            args.push(OsStr::new(flag));
        }

        let browser = Browser::new(LaunchOptions {
            headless,
            sandbox: false,
            args,
            idle_browser_timeout: Duration::from_secs(900),
            ..Default::default()
        })
        .context("failed to launch browser")?;

        let tab = browser.new_tab().context("failed to open tab")?;

        Ok(Self { browser, tab })
    }

    pub fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("failed to navigate to {url}"))?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    pub fn current_url(&self) -> String {
        self.tab.get_url()
    }

    /// Full serialized HTML of the current document.
    pub fn content(&self) -> Result<String> {
        self.tab.get_content().context("failed to read page content")
    }

    pub fn refresh(&self) -> Result<()> {
        let url = self.current_url();
        self.goto(&url)
    }

    pub fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .with_context(|| format!("element '{selector}' did not appear"))?;
        Ok(())
    }

    pub fn click(&self, selector: &str) -> Result<()> {
        self.tab
            .find_element(selector)
            .with_context(|| format!("element '{selector}' not found"))?
            .click()
            .with_context(|| format!("failed to click '{selector}'"))?;
        Ok(())
    }

    /// Focus a field, clear it, and type character by character with a
    /// fixed inter-key delay. Element handles are not held across awaits.
    pub async fn type_slowly(&self, selector: &str, text: &str, per_char: Duration) -> Result<()> {
        {
            let element = self
                .tab
                .find_element(selector)
                .with_context(|| format!("input '{selector}' not found"))?;
            element.click()?;
            element.call_js_fn("function() { this.value = ''; }", vec![], false)?;
        }
        for ch in text.chars() {
            self.tab.type_str(&ch.to_string())?;
            tokio::time::sleep(per_char).await;
        }
        Ok(())
    }

    pub fn press_enter(&self) -> Result<()> {
        self.tab.press_key("Enter").context("failed to press Enter")?;
        Ok(())
    }

    /// Evaluate an expression and return its string value, if any.
    pub fn eval_string(&self, expression: &str) -> Result<Option<String>> {
        let result = self
            .tab
            .evaluate(expression, false)
            .context("script evaluation failed")?;
        Ok(result
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    /// Scroll down the page in uneven increments with short pauses.
    /// Virtualized result lists only render items as they come into view,
    /// so a scroll pass is required before reading the full content.
    pub async fn scroll_page(&self) -> Result<()> {
        let plan = {
            let mut rng = rand::thread_rng();
            scroll_plan(&mut rng)
        };
        for (pixels, pause_ms) in plan {
            self.tab
                .evaluate(&format!("window.scrollBy(0, {pixels})"), false)
                .context("scroll step failed")?;
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
        }
        Ok(())
    }

    /// Best-effort wipe of cookies and web storage for the current origin,
    /// used when switching proxies mid-run.
    pub fn clear_session_data(&self) -> Result<()> {
        self.tab
            .evaluate(
                r#"(() => {
                    try { localStorage.clear(); } catch (e) {}
                    try { sessionStorage.clear(); } catch (e) {}
                    document.cookie.split(';').forEach(c => {
                        const name = c.split('=')[0].trim();
                        document.cookie = name + '=;expires=Thu, 01 Jan 1970 00:00:00 GMT;path=/';
                    });
                    return 'ok';
                })()"#,
                false,
            )
            .context("failed to clear session data")?;
        Ok(())
    }

    /// Wait for a freshly opened tab (e.g. an external apply page), read its
    /// final URL, and close it. Returns `None` when no new tab appears
    /// within the deadline.
    pub async fn capture_popup_url(&self, wait: Duration) -> Result<Option<String>> {
        let primary_id = self.tab.get_target_id().clone();
        let deadline = Instant::now() + wait;

        loop {
            let popup = {
                let tabs = self
                    .browser
                    .get_tabs()
                    .lock()
                    .map_err(|_| anyhow::anyhow!("browser tab list lock poisoned"))?;
                tabs.iter()
                    .find(|t| *t.get_target_id() != primary_id)
                    .cloned()
            };

            if let Some(popup) = popup {
                popup.wait_until_navigated().ok();
                let url = popup.get_url();
                if let Err(e) = popup.close_target() {
                    tracing::warn!(error = %e, "failed to close popup tab");
                }
                return Ok(Some(url));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

/// One scroll pass: step sizes in pixels and the pause after each step.
fn scroll_plan(rng: &mut impl Rng) -> Vec<(u32, u64)> {
    let steps = rng.gen_range(4..=8);
    (0..steps)
        .map(|_| (rng.gen_range(300..=700), rng.gen_range(400..=900)))
        .collect()
}
