use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::content_cache::ContentCache;
use super::error::CacheError;
use super::translation_cache::TranslationCache;

/// 缓存清理任务
pub struct CacheCleanupTask {
    cache: ContentCache,
    translations: TranslationCache,
    interval: Duration,
    shutdown: CancellationToken,
}

/// 一次清理删除的条目数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub cache: u64,
    pub translations: u64,
}

impl CacheCleanupTask {
    pub fn new(
        cache: ContentCache,
        translations: TranslationCache,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cache,
            translations,
            interval,
            shutdown,
        }
    }

    /// 执行一次清理
    pub async fn run_once(&self) -> Result<CleanupReport, CacheError> {
        Ok(CleanupReport {
            cache: self.cache.clear_expired().await?,
            translations: self.translations.clear_expired().await?,
        })
    }

    /// 启动定期清理任务，直到 shutdown token 被取消
    pub async fn start(self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Cache cleanup task stopped");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(report) => tracing::debug!(
                            "Cache cleanup completed. Removed: cache={}, translations={}",
                            report.cache,
                            report.translations
                        ),
                        Err(e) => tracing::error!("缓存清理失败: {}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheTtlConfig;
    use crate::database::Database;
    use crate::models::CacheType;

    #[tokio::test]
    async fn test_run_once_sweeps_both_tables() {
        let database = Database::in_memory().await.unwrap();
        let cache = ContentCache::new(database.pool().clone(), CacheTtlConfig::default());
        let translations = TranslationCache::new(database.pool().clone());

        cache
            .set("a", "v", CacheType::Image, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        cache.set("b", "v", CacheType::Other, None).await.unwrap();
        translations
            .set("t", "en", "es", "x", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let task = CacheCleanupTask::new(
            cache.clone(),
            translations.clone(),
            Duration::from_secs(60),
            CancellationToken::new(),
        );
        let report = task.run_once().await.unwrap();
        assert_eq!(report, CleanupReport { cache: 1, translations: 1 });
        assert_eq!(cache.get("b", CacheType::Other).await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let database = Database::in_memory().await.unwrap();
        let shutdown = CancellationToken::new();
        let task = CacheCleanupTask::new(
            ContentCache::new(database.pool().clone(), CacheTtlConfig::default()),
            TranslationCache::new(database.pool().clone()),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        let handle = tokio::spawn(task.start());
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
