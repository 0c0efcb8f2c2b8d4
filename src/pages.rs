//! Server-rendered dashboard.

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use minijinja::{context, Environment};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::analysis::{analyze_chart, ChartAnalysis, ChartImage, Timeframe};
use crate::api::{models::NewsQuery, upload::AnalysisForm};
use crate::error::{AppError, Result};
use crate::news::{default_source, find_source, Headlines, NewsSource, NEWS_SOURCES};
use crate::AppState;

pub const PAGE_TITLE: &str = "Analisis Trading AI";
pub const STYLESHEET: &str = include_str!("../templates/style.css");
pub const UPLOAD_HINT: &str = "Silakan unggah gambar untuk memulai analisis.";

#[derive(Serialize)]
struct NavItem {
    icon: &'static str,
    label: &'static str,
    active: bool,
}

const NAV_ITEMS: [NavItem; 6] = [
    NavItem { icon: "🧠", label: "Analisis AI", active: true },
    NavItem { icon: "🕒", label: "History", active: false },
    NavItem { icon: "📈", label: "Pasar aset", active: false },
    NavItem { icon: "📰", label: "Berita", active: false },
    NavItem { icon: "👑", label: "Premium", active: false },
    NavItem { icon: "👤", label: "Profile", active: false },
];

static TEMPLATES: OnceCell<Environment<'static>> = OnceCell::new();

fn templates() -> Result<&'static Environment<'static>> {
    TEMPLATES.get_or_try_init(|| {
        let mut env = Environment::new();
        env.add_template("index.html", include_str!("../templates/index.html"))?;
        Ok::<_, AppError>(env)
    })
}

#[derive(Serialize)]
struct AnalysisView {
    timeframe: &'static str,
    model: String,
    html: String,
    disclaimer_html: String,
}

impl From<ChartAnalysis> for AnalysisView {
    fn from(analysis: ChartAnalysis) -> Self {
        Self {
            timeframe: analysis.timeframe.label(),
            model: analysis.model,
            html: analysis.html,
            disclaimer_html: analysis.disclaimer_html,
        }
    }
}

#[derive(Serialize)]
struct PreviewView {
    data_uri: String,
    file_name: Option<String>,
    width: u32,
    height: u32,
}

/// Everything one render of the dashboard may show.
pub struct Dashboard {
    timeframe: Timeframe,
    source: NewsSource,
    preview: Option<PreviewView>,
    analysis: Option<AnalysisView>,
    analysis_error: Option<String>,
    news: Option<Headlines>,
    news_error: Option<String>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::default(),
            source: default_source(),
            preview: None,
            analysis: None,
            analysis_error: None,
            news: None,
            news_error: None,
        }
    }
}

impl Dashboard {
    pub fn render(&self) -> Result<String> {
        let template = templates()?.get_template("index.html")?;
        let timeframes: Vec<&str> = Timeframe::ALL.iter().map(|tf| tf.label()).collect();
        let sources: Vec<&str> = NEWS_SOURCES.iter().map(|s| s.label).collect();

        let html = template.render(context! {
            title => PAGE_TITLE,
            upload_hint => UPLOAD_HINT,
            timeframes => timeframes,
            selected_timeframe => self.timeframe.label(),
            sources => sources,
            selected_source => self.source.label,
            nav => NAV_ITEMS,
            preview => &self.preview,
            analysis => &self.analysis,
            analysis_error => &self.analysis_error,
            news => &self.news,
            news_error => &self.news_error,
        })?;

        Ok(html)
    }

    fn into_response(self, status: StatusCode) -> Response {
        match self.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(err) => {
                tracing::error!("Failed to render dashboard: {}", err);
                err.into_response()
            }
        }
    }
}

pub async fn index() -> Response {
    Dashboard::default().into_response(StatusCode::OK)
}

pub async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}

pub async fn analyze_page(State(state): State<AppState>, multipart: Multipart) -> Response {
    let mut page = Dashboard::default();

    let mut form = match AnalysisForm::read(multipart).await {
        Ok(form) => form,
        Err(err) => return page.with_analysis_error(err),
    };
    page.timeframe = form.timeframe;

    let image = match form.decode_image() {
        Ok(image) => image,
        Err(err) => return page.with_analysis_error(err),
    };
    page.preview = Some(preview(&image, form.file_name.take()));

    match analyze_chart(state.model.as_ref(), &image, form.timeframe).await {
        Ok(analysis) => {
            page.analysis = Some(analysis.into());
            page.into_response(StatusCode::OK)
        }
        Err(err) => page.with_analysis_error(err),
    }
}

pub async fn news_page(State(state): State<AppState>, Query(query): Query<NewsQuery>) -> Response {
    let mut page = Dashboard::default();

    let source = match query.source.as_deref().map(find_source).transpose() {
        Ok(source) => source.unwrap_or_else(default_source),
        Err(err) => return page.with_news_error(err),
    };
    page.source = source;

    match state.news.headlines(source).await {
        Ok(headlines) => {
            page.news = Some(headlines);
            page.into_response(StatusCode::OK)
        }
        Err(err) => page.with_news_error(err),
    }
}

fn preview(image: &ChartImage, file_name: Option<String>) -> PreviewView {
    PreviewView {
        data_uri: image.data_uri(),
        file_name,
        width: image.width,
        height: image.height,
    }
}

impl Dashboard {
    fn with_analysis_error(mut self, err: AppError) -> Response {
        tracing::warn!("Chart analysis failed: {}", err);
        let status = err.status_code();
        self.analysis_error = Some(err.user_message());
        self.into_response(status)
    }

    fn with_news_error(mut self, err: AppError) -> Response {
        tracing::warn!("News fetch failed: {}", err);
        let status = err.status_code();
        self.news_error = Some(err.user_message());
        self.into_response(status)
    }
}
