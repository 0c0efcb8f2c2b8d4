use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chart_insight::{
    api::routes::create_router,
    config::Config,
    error::AppError,
    llm::GeminiClient,
    news::{HttpFeedFetcher, NewsService},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration problems stop the process before anything is served.
    let config = Config::load().inspect_err(report_fatal)?;
    let server_addr = config.server_addr;

    let model = GeminiClient::from_config(&config);
    model.verify_model().await.inspect_err(report_fatal)?;
    tracing::info!("Gemini model '{}' is available", config.gemini_model);

    let news = NewsService::new(Arc::new(HttpFeedFetcher::new()?));
    let app_state = AppState::new(Arc::new(model), news);

    let app = create_router(app_state);
    let listener = TcpListener::bind(server_addr).await?;

    tracing::info!("Listening on http://{}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn report_fatal(err: &AppError) {
    tracing::error!("{}", err);
}
