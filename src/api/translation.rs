use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::response::{success, success_with_message};
use super::AppState;

/// 获取可用语言列表
pub async fn languages(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let languages = state.services.translation.languages().await;
    Ok(success(json!({ "languages": languages })))
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub text: String,
}

/// 检测文本语言
pub async fn detect(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.text.is_empty() {
        return Err(ApiError::Validation("Text is required".to_string()));
    }

    let detected = state
        .services
        .translation
        .detect_language(&request.text)
        .await?;
    Ok(success(detected))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub target_language: String,
    pub source_language: Option<String>,
}

/// 翻译单条文本
pub async fn translate(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.text.is_empty() {
        return Err(ApiError::Validation("Text is required".to_string()));
    }
    if request.target_language.is_empty() {
        return Err(ApiError::Validation("Target language is required".to_string()));
    }

    let translated_text = state
        .services
        .translation
        .translate(
            &request.text,
            &request.target_language,
            request.source_language.as_deref(),
        )
        .await?;

    Ok(success(json!({
        "translatedText": translated_text,
        "sourceLanguage": request.source_language.as_deref().unwrap_or("auto"),
        "targetLanguage": request.target_language,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateBatchRequest {
    #[serde(default)]
    pub texts: Vec<String>,
    #[serde(default)]
    pub target_language: String,
    pub source_language: Option<String>,
}

/// 批量翻译，结果顺序与输入一致
pub async fn translate_batch(
    State(state): State<AppState>,
    Json(request): Json<TranslateBatchRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.texts.is_empty() || request.texts.iter().any(|t| t.is_empty()) {
        return Err(ApiError::Validation("Texts array is required".to_string()));
    }
    if request.target_language.is_empty() {
        return Err(ApiError::Validation("Target language is required".to_string()));
    }

    let translations = state
        .services
        .translation
        .translate_batch(
            &request.texts,
            &request.target_language,
            request.source_language.as_deref(),
        )
        .await?;

    Ok(success(json!({
        "translations": translations,
        "sourceLanguage": request.source_language.as_deref().unwrap_or("auto"),
        "targetLanguage": request.target_language,
    })))
}

/// 清空翻译缓存
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let removed = state.services.translation.clear_cache().await?;
    tracing::info!("翻译缓存已清空: {} 条", removed);

    Ok(success_with_message(
        json!({ "removed": removed }),
        "Translation cache cleared",
    ))
}
