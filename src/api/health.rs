use axum::{extract::State, response::IntoResponse};
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::response::success;
use super::AppState;

/// 健康检查端点
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let services = &state.services;

    // 检查数据库连接
    services.database.verify_integrity().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::Internal("Database connection failed".to_string())
    })?;

    let db_stats = services
        .database
        .get_stats()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to get database stats: {}", e)))?;

    let google_search = if services.search.google_configured() {
        "configured"
    } else {
        "not_configured"
    };

    Ok(success(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "database": "connected",
        "database_size_mb": db_stats.database_size_mb(),
        "cache_entries": db_stats.cache_count,
        "translation_entries": db_stats.translation_count,
        "google_search": google_search,
        "browser_running": services.search.browser_running().await,
    })))
}
