use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{error_message, BackendError};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama 文本生成客户端
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    default_model: String,
}

#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama 不可用: {}", e);
                false
            }
        }
    }

    /// 已安装的模型名称，失败时返回空列表
    pub async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.base_url);
        let result = async {
            let response = self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await?;
            let tags: TagsResponse = response.error_for_status()?.json().await?;
            Ok::<_, reqwest::Error>(tags)
        }
        .await;

        match result {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                tracing::warn!("获取模型列表失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 非流式生成
    pub async fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = GeneratePayload {
            model: model.unwrap_or(&self.default_model),
            prompt,
            stream: false,
            options: temperature.map(|temperature| GenerateOptions { temperature }),
        };

        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Backend(format!(
                "Ollama API error: {}",
                error_message(response).await
            )));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }
}
