pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod news;
pub mod pages;

use std::sync::Arc;

use llm::VisionModel;
use news::NewsService;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn VisionModel>,
    pub news: Arc<NewsService>,
}

impl AppState {
    pub fn new(model: Arc<dyn VisionModel>, news: NewsService) -> Self {
        Self {
            model,
            news: Arc::new(news),
        }
    }
}
