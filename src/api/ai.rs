use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::response::success;
use super::AppState;

/// 文本生成后端健康状态
pub async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let healthy = state.services.text.check_health().await;

    Ok(success(json!({
        "status": if healthy { "ok" } else { "unavailable" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// 已安装的模型列表
pub async fn models(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let models = state.services.text.list_models().await;
    Ok(success(json!({ "models": models })))
}

#[derive(Debug, Deserialize)]
pub struct GenerateTextRequest {
    #[serde(default)]
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// 生成文本（结果会被缓存）
pub async fn generate_text(
    State(state): State<AppState>,
    Json(request): Json<GenerateTextRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.prompt.is_empty() {
        return Err(ApiError::Validation("Prompt is required".to_string()));
    }
    if let Some(temperature) = request.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ApiError::Validation(format!(
                "Invalid temperature: {} (must be between 0 and 2)",
                temperature
            )));
        }
    }

    let text = state
        .services
        .text
        .generate(
            &request.prompt,
            request.model.as_deref(),
            request.temperature,
        )
        .await?;

    Ok(success(json!({ "text": text })))
}
