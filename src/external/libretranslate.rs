use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{error_message, BackendError};
use crate::models::{DetectedLanguage, LanguageInfo};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// LibreTranslate 客户端
#[derive(Clone)]
pub struct LibreTranslateClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct TranslatePayload<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Serialize)]
struct DetectPayload<'a> {
    q: &'a str,
}

impl LibreTranslateClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// 健康检查：GET /languages，5 秒超时
    pub async fn health_check(&self) -> Result<(), BackendError> {
        let url = format!("{}/languages", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| BackendError::ServiceUnavailable(format!("翻译服务不可用: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::ServiceUnavailable(format!(
                "翻译服务不可用: HTTP {}",
                response.status().as_u16()
            )))
        }
    }

    pub async fn languages(&self) -> Result<Vec<LanguageInfo>, BackendError> {
        let url = format!("{}/languages", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Backend(error_message(response).await));
        }

        Ok(response.json().await?)
    }

    /// 检测语言，返回置信度最高的结果
    pub async fn detect(&self, text: &str) -> Result<DetectedLanguage, BackendError> {
        let url = format!("{}/detect", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DetectPayload { q: text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Backend(error_message(response).await));
        }

        let results: Vec<DetectedLanguage> = response.json().await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("语言检测结果为空".to_string()))
    }

    pub async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, BackendError> {
        let url = format!("{}/translate", self.base_url);
        let payload = TranslatePayload {
            q: text,
            source,
            target,
            format: "text",
        };

        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Backend(error_message(response).await));
        }

        let body: TranslateResponse = response.json().await?;
        Ok(body.translated_text)
    }
}
