use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::analysis::{ChartAnalysis, Timeframe};
use crate::news::{FeedEntry, Headlines, NewsSource};

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub source: Option<String>,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub timeframe: Timeframe,
    pub model: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "analysis_markdown")]
    pub markdown: String,
    #[serde(rename = "analysis_html")]
    pub html: String,
    pub disclaimer: &'static str,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalyzeResponse {
    pub fn new(analysis: ChartAnalysis, mime_type: &'static str, width: u32, height: u32) -> Self {
        Self {
            timeframe: analysis.timeframe,
            model: analysis.model,
            mime_type,
            width,
            height,
            markdown: analysis.markdown,
            html: analysis.html,
            disclaimer: analysis.disclaimer,
            analyzed_at: Utc::now(),
        }
    }
}

#[derive(Serialize)]
pub struct NewsResponse {
    pub source: &'static str,
    pub url: &'static str,
    pub total_entries: usize,
    pub entries: Vec<FeedEntry>,
    pub served_at: DateTime<Utc>,
}

impl From<Headlines> for NewsResponse {
    fn from(headlines: Headlines) -> Self {
        Self {
            source: headlines.source.label,
            url: headlines.source.url,
            total_entries: headlines.total_entries,
            entries: headlines.entries,
            served_at: Utc::now(),
        }
    }
}

#[derive(Serialize)]
pub struct OptionsResponse {
    pub timeframes: Vec<&'static str>,
    pub default_timeframe: &'static str,
    pub news_sources: Vec<NewsSource>,
    pub accepted_image_types: [&'static str; 2],
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
}
