//! Upstream proxy rotation.
//!
//! A fixed ordered list of endpoints and a circular cursor. Chrome only
//! honors `--proxy-server` and the auth extension at launch, so rotation is
//! best effort: the extension artifact is regenerated for the new endpoint,
//! browser storage and cookies are cleared, and the current page reloaded.
//! A failed rotation keeps the previous proxy and is never fatal.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::browser::BrowserSession;
use crate::pacing::Pacer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ProxyEndpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .with_context(|| format!("proxy endpoint '{s}' is not host:port"))?;
        if host.is_empty() {
            bail!("proxy endpoint '{s}' has an empty host");
        }
        let port = port
            .parse::<u16>()
            .with_context(|| format!("proxy endpoint '{s}' has an invalid port"))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

/// Circular cursor over the configured endpoints plus the on-disk
/// auth-extension artifact for the current one.
pub struct ProxyRotator {
    endpoints: Vec<ProxyEndpoint>,
    credentials: Option<ProxyCredentials>,
    cursor: usize,
    extension_dir: PathBuf,
}

impl ProxyRotator {
    pub fn new(
        endpoints: Vec<ProxyEndpoint>,
        credentials: Option<ProxyCredentials>,
        extension_dir: PathBuf,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            bail!("proxy rotator requires at least one endpoint");
        }
        Ok(Self {
            endpoints,
            credentials,
            cursor: 0,
            extension_dir,
        })
    }

    pub fn current(&self) -> &ProxyEndpoint {
        &self.endpoints[self.cursor]
    }

    /// Advance the cursor circularly and return the new current endpoint.
    pub fn advance(&mut self) -> &ProxyEndpoint {
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        self.current()
    }

    /// Value for Chrome's `--proxy-server` launch argument.
    pub fn chrome_arg_value(&self) -> String {
        format!("http://{}", self.current())
    }

    pub fn requires_auth(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn extension_dir(&self) -> &Path {
        &self.extension_dir
    }

    /// Regenerate the unpacked proxy-auth extension for the current
    /// endpoint. Chrome picks it up via `--load-extension` at launch.
    pub fn write_auth_extension(&self) -> Result<PathBuf> {
        let credentials = self
            .credentials
            .as_ref()
            .context("proxy credentials not configured")?;

        std::fs::create_dir_all(&self.extension_dir).with_context(|| {
            format!(
                "failed to create extension dir {}",
                self.extension_dir.display()
            )
        })?;

        let endpoint = self.current();
        std::fs::write(self.extension_dir.join("manifest.json"), EXTENSION_MANIFEST)
            .context("failed to write extension manifest")?;
        std::fs::write(
            self.extension_dir.join("background.js"),
            background_script(endpoint, credentials),
        )
        .context("failed to write extension background script")?;

        Ok(self.extension_dir.clone())
    }
}

const EXTENSION_MANIFEST: &str = r#"{
    "version": "1.0.0",
    "manifest_version": 2,
    "name": "Proxy Auth",
    "permissions": [
        "proxy",
        "tabs",
        "unlimitedStorage",
        "storage",
        "webRequest",
        "webRequestBlocking"
    ],
    "background": {
        "scripts": ["background.js"]
    }
}
"#;

fn background_script(endpoint: &ProxyEndpoint, credentials: &ProxyCredentials) -> String {
    format!(
        r#"var config = {{
    mode: "fixed_servers",
    rules: {{
        singleProxy: {{
            scheme: "http",
            host: "{host}",
            port: {port}
        }},
        bypassList: []
    }}
}};

chrome.proxy.settings.set({{value: config, scope: "regular"}}, function() {{}});

function callbackFn(details) {{
    return {{
        authCredentials: {{
            username: "{username}",
            password: "{password}"
        }}
    }};
}}

chrome.webRequest.onAuthRequired.addListener(
    callbackFn,
    {{urls: ["<all_urls>"]}},
    ['blocking']
);
"#,
        host = endpoint.host,
        port = endpoint.port,
        username = credentials.username,
        password = credentials.password,
    )
}

/// Rotate to the next proxy: regenerate the auth artifact, clear browser
/// state and reload. Returns false (after logging) when rotation failed and
/// the previous proxy remains in effect.
pub async fn rotate(rotator: &mut ProxyRotator, browser: &BrowserSession, pacer: &Pacer) -> bool {
    pacer.pause(pacer.delays.pre_rotation).await;

    let endpoint = rotator.advance().clone();

    if rotator.requires_auth() {
        if let Err(e) = rotator.write_auth_extension() {
            tracing::warn!(error = %e, proxy = %endpoint, "failed to rebuild proxy extension, keeping previous proxy");
            return false;
        }
    }

    if let Err(e) = browser.clear_session_data() {
        tracing::warn!(error = %e, "failed to clear browser state during rotation");
    }

    pacer.pause(pacer.delays.page_settle).await;

    if let Err(e) = browser.refresh() {
        tracing::warn!(error = %e, proxy = %endpoint, "failed to reload after proxy rotation");
        return false;
    }

    pacer.pause(pacer.delays.post_rotation).await;
    tracing::info!(proxy = %endpoint, "rotated proxy");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<ProxyEndpoint> {
        (0..n)
            .map(|i| ProxyEndpoint {
                host: format!("proxy-{i}.example"),
                port: 31280 + i as u16,
            })
            .collect()
    }

    #[test]
    fn cursor_cycles_in_order_and_wraps() {
        let mut rotator =
            ProxyRotator::new(endpoints(3), None, std::env::temp_dir().join("ext")).unwrap();

        assert_eq!(rotator.current().host, "proxy-0.example");
        let visited: Vec<String> = (0..6).map(|_| rotator.advance().host.clone()).collect();
        assert_eq!(
            visited,
            vec![
                "proxy-1.example",
                "proxy-2.example",
                "proxy-0.example",
                "proxy-1.example",
                "proxy-2.example",
                "proxy-0.example",
            ]
        );
    }

    #[test]
    fn empty_endpoint_list_is_rejected() {
        assert!(ProxyRotator::new(vec![], None, PathBuf::from("/tmp/x")).is_err());
    }

    #[test]
    fn endpoint_parses_host_and_port() {
        let ep: ProxyEndpoint = "us.proxymesh.example:31280".parse().unwrap();
        assert_eq!(ep.host, "us.proxymesh.example");
        assert_eq!(ep.port, 31280);
        assert!("hostonly".parse::<ProxyEndpoint>().is_err());
        assert!(":31280".parse::<ProxyEndpoint>().is_err());
    }

    #[test]
    fn auth_extension_embeds_current_endpoint() {
        let dir = std::env::temp_dir().join("harvester_proxy_ext_test");
        let rotator = ProxyRotator::new(
            endpoints(2),
            Some(ProxyCredentials {
                username: "user".into(),
                password: "secret".into(),
            }),
            dir.clone(),
        )
        .unwrap();

        let written = rotator.write_auth_extension().unwrap();
        let background = std::fs::read_to_string(written.join("background.js")).unwrap();
        assert!(background.contains("proxy-0.example"));
        assert!(background.contains("31280"));
        assert!(background.contains("secret"));

        std::fs::remove_dir_all(dir).ok();
    }
}
