use std::time::Duration;

use thiserror::Error;

/// 外部后端调用错误
#[derive(Debug, Error)]
pub enum BackendError {
    /// 缺少凭据等配置问题，在发起任何网络请求之前返回，不应重试
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 健康检查失败、连接被拒绝或超时
    #[error("服务不可用: {0}")]
    ServiceUnavailable(String),

    /// 后端返回非成功状态，携带后端自己的错误信息
    #[error("后端错误: {0}")]
    Backend(String),

    #[error("请求过于频繁，请 {} 毫秒后重试", retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    #[error("无效的响应: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            BackendError::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Backend(format!("HTTP {}", status.as_u16()))
        } else {
            BackendError::Backend(err.to_string())
        }
    }
}

/// 从失败响应中提取后端的错误信息
///
/// 依次尝试 JSON 的 `error` / `error.message` / `detail` / `message` 字段，
/// 都没有时返回原始文本或状态码
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
        let message = json
            .get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
            .or_else(|| json.get("detail").and_then(|d| d.as_str()))
            .or_else(|| json.get("message").and_then(|m| m.as_str()));
        if let Some(message) = message {
            return message.to_string();
        }
    }

    if body.trim().is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        body
    }
}
