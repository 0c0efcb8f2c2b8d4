use axum::{
    routing::{get, post},
    Router,
    extract::{DefaultBodyLimit, Json, Multipart, Query, State},
    response::IntoResponse,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;

use crate::analysis::{analyze_chart, Timeframe};
use crate::api::models::{AnalyzeResponse, HealthResponse, NewsQuery, NewsResponse, OptionsResponse};
use crate::api::response;
use crate::api::upload::AnalysisForm;
use crate::error::{AppError, Result};
use crate::news::{default_source, find_source, NEWS_SOURCES};
use crate::pages;
use crate::AppState;

/// Uploads larger than this are rejected before the handler runs.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/analyze", post(pages::analyze_page))
        .route("/news", get(pages::news_page))
        .route("/static/style.css", get(pages::stylesheet))
        .route("/health", get(health_handler))
        .route("/api/options", get(options_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/news", get(news_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.model_name().to_string(),
    })
}

async fn options_handler() -> impl IntoResponse {
    response::success(OptionsResponse {
        timeframes: Timeframe::ALL.iter().map(|tf| tf.label()).collect(),
        default_timeframe: Timeframe::default().label(),
        news_sources: NEWS_SOURCES.to_vec(),
        accepted_image_types: ["image/jpeg", "image/png"],
    })
}

async fn analyze_handler(State(state): State<AppState>, multipart: Multipart) -> impl IntoResponse {
    let start_time = std::time::Instant::now();
    let result = process_analyze_request(&state, multipart).await;
    tracing::info!("Analysis request took {:?}", start_time.elapsed());

    match result {
        Ok(data) => response::success(data),
        Err(err) => reply_error(err),
    }
}

async fn process_analyze_request(state: &AppState, multipart: Multipart) -> Result<AnalyzeResponse> {
    let mut form = AnalysisForm::read(multipart).await?;
    let image = form.decode_image()?;
    tracing::debug!(
        "Decoded {} upload {:?} ({}x{})",
        image.mime_type(),
        form.file_name,
        image.width,
        image.height
    );

    let analysis = analyze_chart(state.model.as_ref(), &image, form.timeframe).await?;
    Ok(AnalyzeResponse::new(analysis, image.mime_type(), image.width, image.height))
}

async fn news_handler(State(state): State<AppState>, Query(query): Query<NewsQuery>) -> impl IntoResponse {
    match process_news_request(&state, &query).await {
        Ok(data) => response::success(data),
        Err(err) => reply_error(err),
    }
}

async fn process_news_request(state: &AppState, query: &NewsQuery) -> Result<NewsResponse> {
    let source = match query.source.as_deref() {
        Some(label) => find_source(label)?,
        None => default_source(),
    };

    let headlines = state.news.headlines(source).await?;
    Ok(headlines.into())
}

fn reply_error<T>(err: AppError) -> response::Reply<T> {
    tracing::warn!("Request failed: {}", err);
    response::error(err.status_code(), err.user_message())
}
