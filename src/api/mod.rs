pub mod ai;
pub mod cache;
pub mod error;
pub mod health;
pub mod images;
pub mod response;
pub mod translation;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::services::AppServices;

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

impl AppState {
    pub fn new(services: AppServices) -> Self {
        Self { services }
    }
}

/// 构建全部 HTTP 路由
pub fn router(state: AppState) -> Router {
    let images_dir = state.services.pipeline.images_dir().to_path_buf();

    Router::new()
        // Health
        .route("/api/health", get(health::health_check))
        // Images
        .route("/api/images/health", get(images::health))
        .route("/api/images/generate", post(images::generate))
        .route("/api/images/jobs", get(images::list_jobs))
        .route(
            "/api/images/job/:job_id",
            get(images::get_job).delete(images::remove_job),
        )
        .route("/api/images/search/google", get(images::search_google))
        .route("/api/images/search/scrape", get(images::search_scrape))
        .route("/api/images/download", post(images::download))
        .route("/api/images/process", post(images::process))
        .route("/api/images/compress", post(images::compress))
        .route("/api/images/remove-background", post(images::remove_background))
        .route("/api/images/upload", post(images::upload))
        .nest_service("/api/images/file", ServeDir::new(images_dir))
        // Translation
        .route("/api/translation/languages", get(translation::languages))
        .route("/api/translation/detect", post(translation::detect))
        .route("/api/translation/translate", post(translation::translate))
        .route(
            "/api/translation/translate/batch",
            post(translation::translate_batch),
        )
        .route("/api/translation/cache", delete(translation::clear_cache))
        // Text generation
        .route("/api/ai/health", get(ai::health))
        .route("/api/ai/models", get(ai::models))
        .route("/api/ai/text", post(ai::generate_text))
        // Cache
        .route("/api/cache/stats", get(cache::get_stats))
        .route("/api/cache/cleanup", post(cache::cleanup))
        .route("/api/cache/type/:cache_type", delete(cache::clear_by_type))
        .route("/api/cache", delete(cache::clear_all))
        .with_state(state)
}
