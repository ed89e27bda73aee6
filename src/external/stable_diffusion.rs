use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{error_message, BackendError};
use crate::models::GenerateImageRequest;

const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, blurry, distorted";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// 图片生成后端
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn check_availability(&self) -> bool;

    /// 生成一张图片，返回原始图片字节
    async fn generate(&self, request: &GenerateImageRequest) -> Result<Vec<u8>, BackendError>;
}

/// Stable Diffusion WebUI 客户端
#[derive(Clone)]
pub struct StableDiffusionClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct Txt2ImgPayload<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    width: u32,
    height: u32,
    steps: u32,
    cfg_scale: f32,
    sampler_name: &'a str,
    seed: i64,
    batch_size: u32,
    n_iter: u32,
}

impl<'a> Txt2ImgPayload<'a> {
    fn from_request(request: &'a GenerateImageRequest) -> Self {
        Self {
            prompt: &request.prompt,
            negative_prompt: request
                .negative_prompt
                .as_deref()
                .unwrap_or(DEFAULT_NEGATIVE_PROMPT),
            width: request.width.unwrap_or(512),
            height: request.height.unwrap_or(512),
            steps: request.steps.unwrap_or(20),
            cfg_scale: request.cfg_scale.unwrap_or(7.0),
            sampler_name: request.sampler_name.as_deref().unwrap_or("Euler a"),
            seed: request.seed.unwrap_or(-1),
            batch_size: 1,
            n_iter: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl StableDiffusionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ImageGenerator for StableDiffusionClient {
    async fn check_availability(&self) -> bool {
        let url = format!("{}/sdapi/v1/sd-models", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Stable Diffusion 不可用: {}", e);
                false
            }
        }
    }

    async fn generate(&self, request: &GenerateImageRequest) -> Result<Vec<u8>, BackendError> {
        let url = format!("{}/sdapi/v1/txt2img", self.base_url);
        let payload = Txt2ImgPayload::from_request(request);

        tracing::info!(
            "Generating image: {}x{}, steps={}",
            payload.width,
            payload.height,
            payload.steps
        );

        let response = self.client.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Backend(error_message(response).await));
        }

        let body: Txt2ImgResponse = response.json().await?;
        let encoded = body
            .images
            .first()
            .ok_or_else(|| BackendError::Backend("未生成任何图片".to_string()))?;

        // 部分版本返回 data URI
        let encoded = encoded
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or(encoded.as_str());

        STANDARD
            .decode(encoded)
            .map_err(|e| BackendError::InvalidResponse(format!("图片 base64 解码失败: {}", e)))
    }
}
