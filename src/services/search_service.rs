use std::sync::Arc;

use serde_json::json;

use crate::external::{BackendError, GoogleImageSearch, ImageScraper};
use crate::models::ImageSearchResult;
use crate::services::cache::ContentCache;

/// 图片搜索服务：API 搜索（带缓存）与浏览器刮削
pub struct ImageSearchService {
    google: GoogleImageSearch,
    scraper: ImageScraper,
    cache: ContentCache,
}

impl ImageSearchService {
    pub fn new(google: GoogleImageSearch, scraper: ImageScraper, cache: ContentCache) -> Arc<Self> {
        Arc::new(Self {
            google,
            scraper,
            cache,
        })
    }

    pub fn google_configured(&self) -> bool {
        self.google.is_configured()
    }

    /// API 搜索，先检查凭据再查缓存
    pub async fn search_images(
        &self,
        query: &str,
        count: u32,
    ) -> Result<Vec<ImageSearchResult>, BackendError> {
        self.google.ensure_configured()?;

        let inputs = json!({ "provider": "google", "query": query, "count": count });
        self.cache
            .image_cache(&inputs, || self.google.search(query, count))
            .await
    }

    /// 浏览器刮削，不缓存，受冷却时间限制
    pub async fn scrape_images(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<ImageSearchResult>, BackendError> {
        self.scraper.scrape_images(query, count).await
    }

    pub async fn browser_running(&self) -> bool {
        self.scraper.is_browser_running().await
    }

    pub async fn close(&self) {
        self.scraper.close().await;
    }
}
