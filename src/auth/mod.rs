//! Session handling for the target site.
//!
//! The crawl engine itself only needs a `reqwest::Client`; this module
//! builds one with a cookie jar and performs the site's form login so that
//! member-only pages resolve during the crawl. A client that never logged
//! in is still a valid collaborator.

use anyhow::{Context, Result, bail};
use log::info;

use crate::config::CrawlConfig;

/// Build an HTTP client with a cookie store so the login session persists
/// across requests.
pub fn new_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .context("building HTTP client")
}

/// Post the login form and verify the site accepted it.
pub async fn login(client: &reqwest::Client, cfg: &CrawlConfig) -> Result<()> {
    let params = [
        ("username", cfg.username.as_str()),
        ("password", cfg.password.as_str()),
    ];

    let resp = client
        .post(&cfg.login_url)
        .form(&params)
        .send()
        .await
        .context("sending login request")?;

    if !resp.status().is_success() {
        bail!("login rejected: {}", resp.status());
    }

    info!(target: "crawler::auth", "login succeeded for {}", cfg.username);
    Ok(())
}
