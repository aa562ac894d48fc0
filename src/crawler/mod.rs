pub mod extractor;


use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ureq::Agent;
use url::Url;

use self::extractor::extract_content;
use crate::config::SiteConfig;

/// A crawled documentation page, ready for chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source_url: String,
    pub title: String,
    pub content: String,
}

/// HTTP client wrapper with a politeness delay between requests.
///
/// Errors are never retried; a failed fetch is reported to the caller
/// as-is.
#[derive(Debug)]
pub struct HttpClient {
    agent: Agent,
    request_delay: Duration,
    last_request_time: Option<Instant>,
}

impl HttpClient {
    #[inline]
    pub fn new(config: &SiteConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            request_delay: Duration::from_millis(config.request_delay_ms),
            last_request_time: None,
        }
    }

    /// Perform an HTTP GET request, sleeping first if the previous request
    /// was too recent.
    #[inline]
    pub fn get(&mut self, url: &str) -> Result<String> {
        self.apply_request_delay();

        debug!("Making HTTP GET request to: {}", url);

        match self.agent.get(url).call() {
            Ok(mut response) => {
                let text = response
                    .body_mut()
                    .read_to_string()
                    .with_context(|| format!("Failed to read response body from {}", url))?;
                debug!("Successfully read {} bytes from {}", text.len(), url);
                Ok(text)
            }
            Err(ureq::Error::StatusCode(status)) => {
                debug!("HTTP request failed with status {}: {}", status, url);
                Err(anyhow!("HTTP error {}", status))
            }
            Err(e) => {
                debug!("HTTP request failed with transport error: {}", e);
                Err(anyhow::Error::from(e))
                    .with_context(|| format!("Failed to make HTTP request to {}", url))
            }
        }
    }

    fn apply_request_delay(&mut self) {
        if let Some(last_time) = self.last_request_time {
            let elapsed = last_time.elapsed();
            if elapsed < self.request_delay {
                let sleep_duration = self.request_delay - elapsed;
                debug!("Rate limiting: sleeping for {:?}", sleep_duration);
                std::thread::sleep(sleep_duration);
            }
        }

        self.last_request_time = Some(Instant::now());
    }
}

/// Validate and normalize a URL
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {}", url_str))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}

/// Check if a URL belongs to the documentation site being crawled
#[inline]
pub fn should_crawl_url(url: &Url, root_url: &Url) -> bool {
    // Must be same scheme and host
    if url.scheme() != root_url.scheme() || url.host() != root_url.host() {
        return false;
    }

    // Must start with the root URL path (excluding trailing filename)
    let root_path = normalize_path_for_filtering(root_url.path());
    let url_path = url.path();

    url_path.starts_with(root_path.as_ref())
}

/// Normalize a URL path for filtering by removing trailing filename if present
fn normalize_path_for_filtering(path: &str) -> Cow<'_, str> {
    if path.ends_with('/') {
        Cow::Borrowed(path)
    } else {
        // Check if the last segment looks like a filename (contains a dot)
        path.rfind('/').map_or_else(
            || Cow::Owned(format!("{}/", path)),
            #[expect(clippy::string_slice, reason = "we know the split point is one byte")]
            |last_slash| {
                let last_segment = &path[last_slash + 1..];
                if last_segment.contains('.') && !last_segment.ends_with('/') {
                    // Looks like a filename, use the directory path
                    Cow::Borrowed(&path[..=last_slash])
                } else {
                    // Not a filename, add trailing slash
                    Cow::Owned(format!("{}/", path))
                }
            },
        )
    }
}

/// Extract all same-site links from HTML content
#[inline]
pub fn extract_links(html: &str, source_url: &Url, root_url: &Url) -> Result<Vec<Url>> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]")
        .map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;

    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href") {
            // Skip non-HTTP(S) links
            if href.starts_with("mailto:")
                || href.starts_with("javascript:")
                || href.starts_with("#")
                || href.starts_with("\\#")
            {
                continue;
            }

            match source_url.join(href) {
                Ok(mut absolute_url) => {
                    absolute_url.set_fragment(None);
                    if should_crawl_url(&absolute_url, root_url) {
                        links.push(absolute_url);
                    }
                }
                Err(e) => {
                    debug!(
                        "Failed to resolve URL '{}' relative to '{}': {}",
                        href, source_url, e
                    );
                }
            }
        }
    }

    // Remove duplicates
    links.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    links.dedup();

    debug!("Extracted {} valid links from {}", links.len(), source_url);
    Ok(links)
}

/// Statistics about a crawl session
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlStats {
    /// Total URLs discovered
    pub total_urls: usize,
    /// URLs successfully fetched and extracted
    pub successful_crawls: usize,
    /// URLs that failed to fetch or extract
    pub failed_crawls: usize,
    /// Duration of crawl session
    pub duration: Duration,
}

/// Breadth-first crawler for a single documentation site
pub struct SiteCrawler {
    http_client: HttpClient,
    config: SiteConfig,
    pub stats: CrawlStats,
}

impl SiteCrawler {
    #[inline]
    pub fn new(config: SiteConfig) -> Self {
        let http_client = HttpClient::new(&config);
        Self {
            http_client,
            config,
            stats: CrawlStats::default(),
        }
    }

    /// Crawl the documentation site from the configured root URL up to the
    /// configured depth, then force-fetch the important-URL allow-list.
    ///
    /// A failure on the root URL aborts the crawl; failures on individual
    /// linked or important pages are logged and skipped.
    #[inline]
    pub fn crawl(&mut self) -> Result<Vec<Document>> {
        let start_time = Instant::now();
        let root_url = validate_url(&self.config.root_url)?;

        info!(
            "Starting crawl of {} (max depth {})",
            root_url, self.config.max_depth
        );

        let mut documents = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(Url, usize)> = VecDeque::new();

        visited.insert(root_url.as_str().to_string());
        queue.push_back((root_url.clone(), 1));
        self.stats.total_urls = 1;

        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Crawling {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };
        bar.set_position(0);
        bar.set_length(1);

        while let Some((url, depth)) = queue.pop_front() {
            bar.set_message(url.to_string());

            let html = match self.http_client.get(url.as_str()) {
                Ok(html) => html,
                Err(e) => {
                    // The root page failing means nothing was crawled at all
                    if url == root_url {
                        bar.finish_and_clear();
                        return Err(e.context(format!("Failed to fetch root URL {}", root_url)));
                    }
                    warn!("Failed to fetch {}: {}", url, e);
                    self.stats.failed_crawls += 1;
                    bar.inc(1);
                    continue;
                }
            };

            match extract_content(&html) {
                Ok(page) => {
                    documents.push(Document {
                        source_url: url.as_str().to_string(),
                        title: page.title,
                        content: page.text,
                    });
                    self.stats.successful_crawls += 1;
                }
                Err(e) => {
                    warn!("Failed to extract content from {}: {}", url, e);
                    self.stats.failed_crawls += 1;
                }
            }
            bar.inc(1);

            // Follow links only while below the depth limit
            if depth < self.config.max_depth {
                let links = match extract_links(&html, &url, &root_url) {
                    Ok(links) => links,
                    Err(e) => {
                        warn!("Failed to extract links from {}: {}", url, e);
                        Vec::new()
                    }
                };

                for link in links {
                    let link_str = link.as_str().to_string();
                    if !visited.contains(&link_str) {
                        visited.insert(link_str);
                        queue.push_back((link, depth + 1));
                        self.stats.total_urls += 1;
                        bar.set_length(self.stats.total_urls as u64);
                    }
                }
            }
        }

        bar.finish_and_clear();

        self.fetch_important_urls(&mut documents, &visited);

        self.stats.duration = start_time.elapsed();
        info!(
            "Crawl completed: {} successful, {} failed, took {:?}",
            self.stats.successful_crawls, self.stats.failed_crawls, self.stats.duration
        );

        Ok(documents)
    }

    /// Force-fetch the allow-list of high-value pages. Each failure here is
    /// logged and skipped so ingestion continues with the remaining content.
    fn fetch_important_urls(&mut self, documents: &mut Vec<Document>, visited: &HashSet<String>) {
        for raw_url in self.config.important_urls.clone() {
            if visited.contains(&raw_url) {
                debug!("Important URL already crawled: {}", raw_url);
                continue;
            }

            match self.fetch_single_page(&raw_url) {
                Ok(document) => {
                    info!("Fetched important URL: {}", raw_url);
                    documents.push(document);
                    self.stats.successful_crawls += 1;
                    self.stats.total_urls += 1;
                }
                Err(e) => {
                    warn!("Failed to load important URL {}: {}", raw_url, e);
                    self.stats.failed_crawls += 1;
                }
            }
        }
    }

    fn fetch_single_page(&mut self, raw_url: &str) -> Result<Document> {
        let url = validate_url(raw_url)?;
        let html = self.http_client.get(url.as_str())?;
        let page = extract_content(&html)?;

        Ok(Document {
            source_url: url.as_str().to_string(),
            title: page.title,
            content: page.text,
        })
    }
}
