// 翻译服务
//
// 编排顺序：空文本 / 同语言直接返回 -> 缺少源语言时先检测 -> 查翻译缓存
// -> 健康检查 -> 调用翻译后端 -> 写入缓存（失败不影响结果）

use thiserror::Error;
use tracing::{debug, warn};

use crate::external::{BackendError, LibreTranslateClient};
use crate::models::{CacheType, DetectedLanguage, LanguageInfo};
use crate::services::cache::{CacheError, ContentCache, KeyDeriver, TranslationCache};

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Clone)]
pub struct TranslationService {
    client: LibreTranslateClient,
    cache: ContentCache,
    translations: TranslationCache,
}

impl TranslationService {
    pub fn new(
        client: LibreTranslateClient,
        cache: ContentCache,
        translations: TranslationCache,
    ) -> Self {
        Self {
            client,
            cache,
            translations,
        }
    }

    /// 后端支持的语言，后端不可用时返回常用语言列表
    pub async fn languages(&self) -> Vec<LanguageInfo> {
        match self.client.languages().await {
            Ok(languages) => languages,
            Err(e) => {
                warn!("获取语言列表失败，使用默认列表: {}", e);
                LanguageInfo::fallback_list()
            }
        }
    }

    /// 检测语言，结果按文本摘要缓存
    pub async fn detect_language(&self, text: &str) -> Result<DetectedLanguage, TranslationError> {
        let key = format!("detect:{}", KeyDeriver::hash_text(text));
        let ttl = self.cache.ttl_config().for_type(CacheType::LanguageDetection);

        self.cache
            .get_or_set_json(&key, CacheType::LanguageDetection, ttl, || async {
                self.client.health_check().await?;
                Ok::<_, TranslationError>(self.client.detect(text).await?)
            })
            .await
    }

    /// 翻译文本
    ///
    /// # 参数
    /// - `target_language`: 目标语言代码
    /// - `source_language`: 源语言代码，None 或 `auto` 时自动检测
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        source_language: Option<&str>,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let source_language = match source_language {
            Some(source) if source != "auto" => source.to_string(),
            _ => self.detect_language(text).await?.language,
        };

        if source_language == target_language {
            return Ok(text.to_string());
        }

        match self
            .translations
            .get(text, &source_language, target_language)
            .await
        {
            Ok(Some(translated)) => {
                debug!("翻译缓存命中: {} -> {}", source_language, target_language);
                return Ok(translated);
            }
            Ok(None) => {}
            Err(e) => warn!("翻译缓存查询失败，按未命中处理: {}", e),
        }

        self.client.health_check().await?;
        let translated = self
            .client
            .translate(text, &source_language, target_language)
            .await?;

        let ttl = self.cache.ttl_config().for_type(CacheType::Translation);
        if let Err(e) = self
            .translations
            .set(text, &source_language, target_language, &translated, ttl)
            .await
        {
            warn!("翻译缓存写入失败，跳过: {}", e);
        }

        Ok(translated)
    }

    /// 批量翻译，按顺序逐条执行，结果与输入一一对应
    pub async fn translate_batch(
        &self,
        texts: &[String],
        target_language: &str,
        source_language: Option<&str>,
    ) -> Result<Vec<String>, TranslationError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate(text, target_language, source_language).await?);
        }
        Ok(results)
    }

    /// 清空翻译缓存和语言检测缓存
    pub async fn clear_cache(&self) -> Result<u64, TranslationError> {
        let translations = self.translations.clear_all().await?;
        let detections = self.cache.clear_by_type(CacheType::LanguageDetection).await?;
        Ok(translations + detections)
    }
}
