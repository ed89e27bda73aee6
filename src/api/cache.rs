// 缓存管理 API
//
// 提供内容缓存的统计与清理端点，包括：
// - 获取缓存统计
// - 手动清理过期条目
// - 按类型清空 / 全部清空

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::models::CacheType;
use crate::services::CacheError;

use super::error::ApiResult;
use super::response::{success, success_with_message};
use super::AppState;

/// 获取缓存统计
///
/// # 端点
/// GET /api/cache/stats
///
/// # 响应
/// ```json
/// {
///   "success": true,
///   "data": {
///     "total": 12,
///     "expired": 1,
///     "byType": { "image": 4, "generation-text": 8 },
///     "translations": 30
///   }
/// }
/// ```
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.services.cache.stats().await?;
    let translations = state.services.translation_cache.count().await?;

    tracing::debug!("获取缓存统计成功");

    Ok(success(json!({
        "total": stats.total,
        "expired": stats.expired,
        "byType": stats.by_type,
        "translations": translations,
    })))
}

/// 立即执行一次过期清理
///
/// # 端点
/// POST /api/cache/cleanup
pub async fn cleanup(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = state.services.cleanup_task().run_once().await?;

    Ok(success_with_message(
        json!({
            "cache": report.cache,
            "translations": report.translations,
        }),
        "Cache cleanup completed",
    ))
}

/// 清空某一类型的缓存
///
/// # 端点
/// DELETE /api/cache/type/{cache_type}
///
/// # 路径参数
/// - `cache_type`: `generation-text` / `image` / `translation` / `language-detection` / `other`
pub async fn clear_by_type(
    State(state): State<AppState>,
    Path(cache_type): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let cache_type: CacheType = cache_type
        .parse()
        .map_err(|_| CacheError::UnknownType(cache_type.clone()))?;
    let removed = state.services.cache.clear_by_type(cache_type).await?;

    tracing::info!("已清空 {} 类型缓存: {} 条", cache_type, removed);

    Ok(success(json!({ "type": cache_type, "removed": removed })))
}

/// 清空全部内容缓存与翻译缓存
///
/// # 端点
/// DELETE /api/cache
pub async fn clear_all(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let cache = state.services.cache.clear_all().await?;
    let translations = state.services.translation_cache.clear_all().await?;

    tracing::info!("All caches cleared: {} entries, {} translations", cache, translations);

    Ok(success_with_message(
        json!({ "cache": cache, "translations": translations }),
        "All caches cleared",
    ))
}
