use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder};
use scraper::Html;
use serde::Serialize;
use tokio::time::Instant;

use crate::cache::{FeedCache, FEED_CACHE_TTL};
use crate::error::{AppError, Result};

pub const FEED_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEADLINE_LIMIT: usize = 10;
pub const DATE_FORMAT: &str = "%d %b %Y, %H:%M";
pub const DATE_PLACEHOLDER: &str = "Tanggal tidak tersedia";

// Some feed hosts reject requests without a browser user agent.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NewsSource {
    pub label: &'static str,
    pub url: &'static str,
}

pub const NEWS_SOURCES: [NewsSource; 5] = [
    NewsSource {
        label: "Yahoo Finance (Umum)",
        url: "https://finance.yahoo.com/news/rssindex",
    },
    NewsSource {
        label: "Investing.com (Saham)",
        url: "https://www.investing.com/rss/news_25.rss",
    },
    NewsSource {
        label: "Seeking Alpha (Investasi)",
        url: "https://seekingalpha.com/market_currents.xml",
    },
    NewsSource {
        label: "CNBC (Keuangan Global)",
        url: "https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=10000664",
    },
    NewsSource {
        label: "Cointelegraph (Crypto)",
        url: "https://cointelegraph.com/rss",
    },
];

pub fn default_source() -> NewsSource {
    NEWS_SOURCES[0]
}

pub fn find_source(label: &str) -> Result<NewsSource> {
    let label = label.trim();
    NEWS_SOURCES
        .iter()
        .copied()
        .find(|s| s.label.eq_ignore_ascii_case(label))
        .ok_or_else(|| AppError::InputError(format!("Sumber berita tidak dikenal: '{}'", label)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub published_display: String,
    /// Summary markup exactly as the feed supplied it.
    pub summary: String,
    pub summary_text: String,
}

pub fn format_published(published: Option<DateTime<Utc>>) -> String {
    published
        .map(|ts| ts.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| DATE_PLACEHOLDER.to_string())
}

/// Collapses a markup fragment to its visible text.
pub fn plain_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let mut result = String::with_capacity(markup.len());

    for word in fragment
        .root_element()
        .text()
        .flat_map(|chunk| chunk.split_whitespace())
    {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(word);
    }

    result
}

fn entry_link(entry: &feed_rs::model::Entry) -> String {
    entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
        .unwrap_or_default()
}

/// Parses an RSS/Atom/JSON feed body, keeping document order.
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(body)
        .map_err(|e| AppError::ParseError(format!("Invalid feed: {}", e)))?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry_link(&entry);
            let published = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|t| t.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "(tanpa judul)".to_string());

            FeedEntry {
                title,
                link,
                published,
                published_display: format_published(published),
                summary_text: plain_text(&summary),
                summary,
            }
        })
        .collect();

    Ok(entries)
}

/// First [`HEADLINE_LIMIT`] entries in feed order.
pub fn headlines(entries: &[FeedEntry]) -> Vec<FeedEntry> {
    entries.iter().take(HEADLINE_LIMIT).cloned().collect()
}

/// Retrieves a raw feed document.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(FEED_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(10)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Headlines {
    pub source: NewsSource,
    pub total_entries: usize,
    pub entries: Vec<FeedEntry>,
}

/// Feed retrieval with a per-URL time-to-live cache in front of the fetcher.
pub struct NewsService {
    fetcher: Arc<dyn FeedFetcher>,
    cache: Mutex<FeedCache>,
}

impl NewsService {
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self::with_ttl(fetcher, FEED_CACHE_TTL)
    }

    pub fn with_ttl(fetcher: Arc<dyn FeedFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(FeedCache::new(ttl)),
        }
    }

    pub async fn entries(&self, url: &str) -> Result<Arc<Vec<FeedEntry>>> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(url, Instant::now()) {
                tracing::debug!("Cache hit for feed: {}", url);
                return Ok(cached);
            }
        }

        tracing::info!("Fetching feed: {}", url);
        let fetch_start = std::time::Instant::now();
        let body = self.fetcher.fetch(url).await?;
        let entries = Arc::new(parse_feed(&body)?);
        tracing::info!(
            "Parsed {} entries from {} in {:?}",
            entries.len(),
            url,
            fetch_start.elapsed()
        );

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url, Arc::clone(&entries), Instant::now());

        Ok(entries)
    }

    pub async fn headlines(&self, source: NewsSource) -> Result<Headlines> {
        let entries = self.entries(source.url).await?;
        Ok(Headlines {
            source,
            total_entries: entries.len(),
            entries: headlines(&entries),
        })
    }
}
