use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use crate::proxy::{ProxyCredentials, ProxyEndpoint};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the job site, e.g. "https://www.linkedin.com".
    pub base_url: String,
    pub account_email: String,
    pub account_password: String,
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub proxy_servers: Vec<ProxyEndpoint>,
    pub proxy_credentials: Option<ProxyCredentials>,
    /// Directory for downloaded company logos.
    pub logo_dir: PathBuf,
    /// Directory the proxy-auth browser extension is regenerated into.
    pub proxy_extension_dir: PathBuf,
    pub headless: bool,
    pub log_file: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let proxy_servers = match env::var("PROXY_SERVERS") {
            Ok(raw) => parse_proxy_list(&raw)?,
            Err(_) => Vec::new(),
        };

        let proxy_credentials = match (env::var("PROXY_USERNAME"), env::var("PROXY_PASSWORD")) {
            (Ok(username), Ok(password)) => Some(ProxyCredentials { username, password }),
            _ => None,
        };

        Ok(Self {
            base_url: env::var("JOBSITE_BASE_URL")
                .unwrap_or_else(|_| "https://www.linkedin.com".to_string()),
            account_email: env::var("JOBSITE_EMAIL").context("JOBSITE_EMAIL must be set")?,
            account_password: env::var("JOBSITE_PASSWORD")
                .context("JOBSITE_PASSWORD must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            proxy_servers,
            proxy_credentials,
            logo_dir: env::var("LOGO_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logos")),
            proxy_extension_dir: env::var("PROXY_EXTENSION_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("harvester_proxy_auth")),
            headless: env::var("HEADLESS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            log_file: env::var("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("harvester.log")),
        })
    }

    pub fn jobs_url(&self) -> String {
        format!("{}/jobs", self.base_url)
    }
}

/// Parse a comma-separated "host:port,host:port" proxy list.
fn parse_proxy_list(raw: &str) -> Result<Vec<ProxyEndpoint>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ProxyEndpoint>()
                .with_context(|| format!("invalid proxy endpoint '{s}' in PROXY_SERVERS"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_list_parses_and_skips_blanks() {
        let list = parse_proxy_list("us.proxy.example:31280, eu.proxy.example:31281,").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].host, "us.proxy.example");
        assert_eq!(list[1].port, 31281);
    }

    #[test]
    fn malformed_proxy_entry_is_an_error() {
        assert!(parse_proxy_list("no-port-here").is_err());
    }
}
