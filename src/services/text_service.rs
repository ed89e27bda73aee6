use serde_json::json;

use crate::external::{BackendError, OllamaClient};
use crate::services::cache::ContentCache;

/// 文本生成服务，结果按 (prompt, model, temperature) 缓存
#[derive(Clone)]
pub struct TextGenerationService {
    client: OllamaClient,
    cache: ContentCache,
}

impl TextGenerationService {
    pub fn new(client: OllamaClient, cache: ContentCache) -> Self {
        Self { client, cache }
    }

    pub async fn check_health(&self) -> bool {
        self.client.check_health().await
    }

    pub async fn list_models(&self) -> Vec<String> {
        self.client.list_models().await
    }

    pub async fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, BackendError> {
        let model = model.unwrap_or(self.client.default_model());
        let inputs = json!({ "prompt": prompt, "model": model, "temperature": temperature });

        self.cache
            .ai_cache(&inputs, || async {
                if !self.client.check_health().await {
                    return Err(BackendError::ServiceUnavailable(
                        "Ollama 服务不可用".to_string(),
                    ));
                }
                self.client.generate(prompt, Some(model), temperature).await
            })
            .await
    }
}
