pub mod cache;
pub mod image;
pub mod jobs;
pub mod search_service;
pub mod text_service;
pub mod translation_service;

pub use cache::{CacheCleanupTask, CacheError, CacheStats, ContentCache, KeyDeriver, TranslationCache};
pub use image::{ImagePipeline, ProcessingError};
pub use jobs::{GenerationError, JobQueue};
pub use search_service::ImageSearchService;
pub use text_service::TextGenerationService;
pub use translation_service::{TranslationError, TranslationService};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::database::Database;
use crate::external::{
    BrowserLauncher, ChromeLauncher, GoogleImageSearch, ImageGenerator, ImageScraper,
    LibreTranslateClient, OllamaClient, StableDiffusionClient,
};

/// 进程级服务集合
///
/// 持有数据库连接、任务队列、浏览器等所有长生命周期资源，
/// 由 init 创建，由 shutdown 统一释放
#[derive(Clone)]
pub struct AppServices {
    pub config: Arc<AppConfig>,
    pub database: Database,
    pub cache: ContentCache,
    pub translation_cache: TranslationCache,
    pub pipeline: ImagePipeline,
    pub generator: Arc<dyn ImageGenerator>,
    pub jobs: JobQueue,
    pub search: Arc<ImageSearchService>,
    pub translation: TranslationService,
    pub text: TextGenerationService,
    shutdown: CancellationToken,
}

impl AppServices {
    /// 使用真实后端初始化
    pub async fn init(config: AppConfig, database: Database) -> anyhow::Result<Self> {
        let generator = Arc::new(StableDiffusionClient::new(
            config.sd_webui_url.clone(),
            config.sd_timeout,
        )?);
        Self::init_with(config, database, generator, Arc::new(ChromeLauncher)).await
    }

    /// 使用指定的图片生成后端与浏览器初始化
    pub async fn init_with(
        config: AppConfig,
        database: Database,
        generator: Arc<dyn ImageGenerator>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> anyhow::Result<Self> {
        let pool = database.pool().clone();
        let cache = ContentCache::new(pool.clone(), config.cache_ttl.clone());
        let translation_cache = TranslationCache::new(pool);

        let pipeline = ImagePipeline::new(config.images_dir.clone()).await?;

        let jobs = JobQueue::new(Arc::clone(&generator), pipeline.clone());
        jobs.start();

        let search = ImageSearchService::new(
            GoogleImageSearch::new(
                config.google_api_key.clone(),
                config.google_search_engine_id.clone(),
                config.google_search_url.clone(),
            ),
            ImageScraper::new(
                launcher,
                config.scrape_cooldown,
                config.scrape_search_url.clone(),
            ),
            cache.clone(),
        );

        let translation = TranslationService::new(
            LibreTranslateClient::new(config.libretranslate_url.clone())?,
            cache.clone(),
            translation_cache.clone(),
        );

        let text = TextGenerationService::new(
            OllamaClient::new(config.ollama_url.clone(), config.ollama_model.clone())?,
            cache.clone(),
        );

        tracing::info!(
            "Services initialized (images dir: {}, google search configured: {})",
            config.images_dir.display(),
            config.google_search_configured()
        );

        Ok(Self {
            config: Arc::new(config),
            database,
            cache,
            translation_cache,
            pipeline,
            generator,
            jobs,
            search,
            translation,
            text,
            shutdown: CancellationToken::new(),
        })
    }

    /// 创建定期清理任务，随 shutdown 一起停止
    pub fn cleanup_task(&self) -> CacheCleanupTask {
        CacheCleanupTask::new(
            self.cache.clone(),
            self.translation_cache.clone(),
            self.config.cache_cleanup_interval,
            self.shutdown.child_token(),
        )
    }

    /// 停止后台任务、关闭浏览器与数据库连接
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down services...");
        self.shutdown.cancel();
        self.jobs.shutdown().await;
        self.search.close().await;
        self.database.close().await;
        tracing::info!("Services stopped");
    }
}
