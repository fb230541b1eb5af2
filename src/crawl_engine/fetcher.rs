//! Per-URL processing: claim, rate-limit, fetch with retry, record, discover.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::controller::Crawler;
use super::rate_limiter::RateLimiter;
use crate::model::Video;
use crate::storage::{DedupStore, OverflowStore, RecordStore};

/// Transport failures are retried this many times in total.
const MAX_FETCH_ATTEMPTS: u64 = 3;

/// Cadence of the progress log, in videos.
const PROGRESS_LOG_EVERY: usize = 1000;

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("date").unwrap());
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Everything a worker needs off a parsed page, extracted eagerly because
/// `scraper::Html` is not `Send` and must never cross an await point.
pub(crate) struct PageData {
    pub title: String,
    pub date: String,
    pub links: Vec<String>,
}

/// Pull title, first `<date>` element text, and all anchor hrefs.
pub(crate) fn extract_page(html: &str) -> PageData {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    let date = doc
        .select(&DATE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let links = doc
        .select(&ANCHOR_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .map(str::to_string)
        .collect();

    PageData { title, date, links }
}

/// Rewrite any URL containing the video marker to `base + marker-and-suffix`,
/// the canonical form used as the record key.
pub(crate) fn canonical_video_url(url: &str, base_url: &str, pattern: &str) -> String {
    match url.find(pattern) {
        Some(idx) => format!("{base_url}{}", &url[idx..]),
        None => url.to_string(),
    }
}

/// Resolve a discovered href against the crawl base.
///
/// Site-relative paths (single leading `/`) are joined onto the base;
/// protocol-relative (`//`) and off-site links are discarded.
pub(crate) fn normalize_link(href: &str, base_url: &str) -> Option<String> {
    let absolute = if href.starts_with('/') && !href.starts_with("//") {
        format!("{base_url}{href}")
    } else {
        href.to_string()
    };
    if !absolute.starts_with(base_url) {
        return None;
    }
    // Malformed hrefs do not belong on the frontier.
    url::Url::parse(&absolute).ok().map(|_| absolute)
}

impl<D: DedupStore, R: RecordStore, O: OverflowStore> Crawler<D, R, O> {
    /// Run one URL through the full pipeline. Every abort path simply
    /// returns; the caller owns the pending-work decrement.
    pub(crate) async fn process_url(&self, url: &str, limiter: &mut RateLimiter) {
        let limit = self.limit.load(Ordering::Relaxed);
        if limit > 0 && self.visited_count() >= limit {
            return;
        }

        // Unclaimed and unreachable store are treated identically: skip the
        // fetch. Under-crawling beats duplicate records.
        match self.dedup.claim(url).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                debug!(target: "crawler::fetch", "claim unavailable for {url}: {e}");
                return;
            }
        }

        limiter.acquire().await;

        let body = match self.fetch_with_retry(url).await {
            Ok(body) => body,
            Err(e) => {
                // Terminal for this URL; the claim keeps it off the frontier
                // until the TTL expires.
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.metrics.fetch_error();
                error!(target: "crawler::fetch", "giving up on {url}: {e:#}");
                return;
            }
        };

        let page = extract_page(&body);
        self.metrics.page_processed();
        debug!(target: "crawler::fetch", "parsed {url}: {} links", page.links.len());

        if url.contains(&self.cfg.video_pattern) {
            self.record_video(url, &page).await;
        }

        for href in &page.links {
            if let Some(absolute) = normalize_link(href, &self.cfg.base_url) {
                self.frontier.offer(absolute).await;
            }
        }
    }

    async fn record_video(&self, url: &str, page: &PageData) {
        let canonical = canonical_video_url(url, &self.cfg.base_url, &self.cfg.video_pattern);
        let title = page
            .title
            .strip_suffix(&self.cfg.title_suffix)
            .unwrap_or(&page.title)
            .to_string();

        let mut video = Video {
            url: canonical,
            title,
            date: page.date.clone(),
            is_target: false,
        };
        video.is_target = video.matches(self.cfg.cutoff_date);
        self.metrics.video_found();

        let (visited, targets) = {
            let mut state = self.state.lock();
            state.visited += 1;
            if video.is_target {
                state.targets.push(video.clone());
            }
            (state.visited, state.targets.len())
        };

        if video.is_target {
            self.metrics.target_found();
            info!(target: "crawler::video", "found target {targets}: {} - {}", video.title, video.url);
        }

        // Targets and non-targets both go to the record store so it holds
        // the complete crawl history, not just the hits.
        if let Err(e) = self.records.upsert(&video).await {
            warn!(target: "crawler::video", "upsert failed for {}: {e}", video.url);
        }

        if visited % PROGRESS_LOG_EVERY == 0 {
            info!(target: "crawler::video", "progress: {visited} videos, {targets} targets");
        }
    }

    /// GET the page body, retrying transport failures with linear backoff.
    ///
    /// An HTTP error status is still a successful GET: the body comes back
    /// and gets parsed like any other page. Only failures to reach the
    /// server or read the response are retried.
    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            let started = Instant::now();
            let result = self.fetch_once(url).await;
            self.metrics.fetch_duration(started.elapsed());

            match result {
                Ok(body) => return Ok(body),
                Err(e) if attempt < MAX_FETCH_ATTEMPTS => {
                    warn!(target: "crawler::fetch", "retry {attempt}/{MAX_FETCH_ATTEMPTS} for {url}: {e:#}");
                    tokio::time::sleep(Duration::from_secs(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(target: "crawler::fetch", "{url} returned {status}, parsing body anyway");
        }
        resp.text()
            .await
            .with_context(|| format!("reading body of {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.vidlii.com";

    #[test]
    fn extracts_title_date_and_links() {
        let html = r#"
            <html><head><title>猫動画 - VidLii</title></head>
            <body>
                <date>  Dec 30, 2021 </date>
                <a href="/watch?v=abc">watch</a>
                <a href="/user/someone">user</a>
                <a>no href</a>
            </body></html>
        "#;
        let page = extract_page(html);
        assert_eq!(page.title, "猫動画 - VidLii");
        assert_eq!(page.date, "Dec 30, 2021");
        assert_eq!(page.links, vec!["/watch?v=abc", "/user/someone"]);
    }

    #[test]
    fn missing_title_and_date_come_back_empty() {
        let page = extract_page("<html><body><p>nothing here</p></body></html>");
        assert_eq!(page.title, "");
        assert_eq!(page.date, "");
        assert!(page.links.is_empty());
    }

    #[test]
    fn canonicalizes_watch_urls_found_under_other_paths() {
        let url = "https://site/user/x/watch?v=ABC123";
        assert_eq!(
            canonical_video_url(url, "https://site", "/watch?v="),
            "https://site/watch?v=ABC123"
        );
    }

    #[test]
    fn canonicalization_leaves_non_video_urls_alone() {
        let url = "https://site/user/x";
        assert_eq!(canonical_video_url(url, "https://site", "/watch?v="), url);
    }

    #[test]
    fn site_relative_links_resolve_against_base() {
        assert_eq!(
            normalize_link("/watch?v=abc", BASE).as_deref(),
            Some("https://www.vidlii.com/watch?v=abc")
        );
    }

    #[test]
    fn protocol_relative_links_are_discarded() {
        assert_eq!(normalize_link("//cdn.example.com/logo.png", BASE), None);
    }

    #[test]
    fn offsite_links_are_discarded() {
        assert_eq!(normalize_link("https://example.com/page", BASE), None);
        assert_eq!(normalize_link("mailto:someone@example.com", BASE), None);
        assert_eq!(normalize_link("relative.html", BASE), None);
    }

    #[test]
    fn unparseable_links_are_discarded() {
        assert_eq!(normalize_link("https://www.vidlii.com:99999/x", BASE), None);
    }

    #[test]
    fn absolute_links_under_base_pass_through() {
        let url = "https://www.vidlii.com/user/rinkomania";
        assert_eq!(normalize_link(url, BASE).as_deref(), Some(url));
    }
}
