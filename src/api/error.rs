use std::fmt;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::external::BackendError;
use crate::models::RequestValidationError;
use crate::services::{CacheError, ProcessingError, TranslationError};

/// 统一的API错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 未找到资源
    NotFound(String),
    /// 验证错误
    Validation(String),
    /// 请求参数错误
    BadRequest(String),
    /// 服务端配置缺失
    Configuration(String),
    /// 外部服务不可用
    ServiceUnavailable(String),
    /// 外部服务返回错误
    ExternalService(String),
    /// 请求过于频繁
    RateLimited(Duration),
    /// 内部服务器错误
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::ExternalService(msg) => write!(f, "External service error: {}", msg),
            ApiError::RateLimited(wait) => {
                write!(f, "Rate limited: retry after {} ms", wait.as_millis())
            }
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Configuration(msg) => ApiError::Configuration(msg),
            BackendError::ServiceUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            BackendError::Backend(msg) => ApiError::ExternalService(msg),
            BackendError::InvalidResponse(msg) => {
                ApiError::ExternalService(format!("无效的响应: {}", msg))
            }
            BackendError::RateLimited { retry_after } => ApiError::RateLimited(retry_after),
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::SourceNotFound(_) => ApiError::NotFound(err.to_string()),
            ProcessingError::InvalidFilename(_) | ProcessingError::InvalidOptions(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ProcessingError::Decode(_) => ApiError::Validation(err.to_string()),
            ProcessingError::Download(_) => ApiError::ExternalService(err.to_string()),
            ProcessingError::Encode(_) | ProcessingError::Io(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::UnknownType(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        match err {
            TranslationError::Backend(e) => e.into(),
            TranslationError::Cache(e) => e.into(),
        }
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(err: RequestValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// 从anyhow::Error转换
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// 实现IntoResponse，将错误转换为HTTP响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Validation(ref msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone())
            }
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Configuration(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    msg.clone(),
                )
            }
            ApiError::ServiceUnavailable(ref msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    msg.clone(),
                )
            }
            ApiError::ExternalService(ref msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, "external_service_error", msg.clone())
            }
            ApiError::RateLimited(wait) => {
                let body = Json(json!({
                    "success": false,
                    "error": {
                        "type": "rate_limited",
                        "message": format!("请求过于频繁，请 {} 毫秒后重试", wait.as_millis()),
                        "retry_after_ms": wait.as_millis() as u64,
                    }
                }));
                return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            }
            ApiError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;
