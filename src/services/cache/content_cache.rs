// 通用内容缓存（SQLite 表 `cache`）
//
// - (key, type) 唯一，写入即覆盖
// - 读取时发现过期则顺手删除（惰性过期），不做全表扫描
// - 全表过期清理由 CacheCleanupTask 定期执行
// - get_or_set 不做请求合并：同一个键的并发未命中可能各自调用一次生产者，
//   最后一次写入生效

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::CacheError;
use super::key::KeyDeriver;
use super::{expires_at_from, millis_to_datetime, now_millis};
use crate::config::CacheTtlConfig;
use crate::models::{CacheEntry, CacheType};

#[derive(sqlx::FromRow)]
struct CacheRow {
    id: String,
    key: String,
    value: String,
    #[sqlx(rename = "type")]
    cache_type: String,
    created_at: i64,
    expires_at: Option<i64>,
}

impl CacheRow {
    fn into_entry(self) -> Result<CacheEntry, CacheError> {
        let cache_type = self
            .cache_type
            .parse::<CacheType>()
            .map_err(|_| CacheError::UnknownType(self.cache_type.clone()))?;

        Ok(CacheEntry {
            id: self.id,
            key: self.key,
            value: self.value,
            cache_type,
            created_at: millis_to_datetime(self.created_at),
            expires_at: self.expires_at.map(millis_to_datetime),
        })
    }
}

/// 缓存统计
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total: i64,
    /// 已过期但尚未被清理的条目数
    pub expired: i64,
    pub by_type: HashMap<String, i64>,
}

#[derive(Clone)]
pub struct ContentCache {
    pool: SqlitePool,
    ttl: CacheTtlConfig,
}

impl ContentCache {
    pub fn new(pool: SqlitePool, ttl: CacheTtlConfig) -> Self {
        Self { pool, ttl }
    }

    pub fn ttl_config(&self) -> &CacheTtlConfig {
        &self.ttl
    }

    /// 写入缓存
    ///
    /// # 参数
    /// - `ttl`: 有效期，None 表示永不过期
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        cache_type: CacheType,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let now = now_millis();

        sqlx::query(
            r#"
            INSERT INTO cache (id, key, value, type, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(key, type) DO UPDATE SET
                value = excluded.value,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(key)
        .bind(value)
        .bind(cache_type.as_str())
        .bind(now)
        .bind(expires_at_from(now, ttl))
        .execute(&self.pool)
        .await?;

        debug!("缓存已写入: {} ({})", key, cache_type);
        Ok(())
    }

    /// 读取完整的缓存条目，过期条目会被删除并返回 None
    pub async fn get_entry(
        &self,
        key: &str,
        cache_type: CacheType,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query_as::<_, CacheRow>(
            "SELECT id, key, value, type, created_at, expires_at FROM cache WHERE key = ? AND type = ?",
        )
        .bind(key)
        .bind(cache_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let entry = row.into_entry()?;
        if entry.is_expired_at(Utc::now()) {
            debug!("缓存已过期，删除: {} ({})", key, cache_type);
            // 删除失败不影响读取结果，残留的行由定期清理移除
            if let Err(e) = self.delete(key, cache_type).await {
                warn!("删除过期缓存失败: {} ({}) - {}", key, cache_type, e);
            }
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// 读取缓存值
    pub async fn get(&self, key: &str, cache_type: CacheType) -> Result<Option<String>, CacheError> {
        Ok(self.get_entry(key, cache_type).await?.map(|entry| entry.value))
    }

    /// 删除缓存条目，返回是否存在
    pub async fn delete(&self, key: &str, cache_type: CacheType) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM cache WHERE key = ? AND type = ?")
            .bind(key)
            .bind(cache_type.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 删除所有在调用时刻之前过期的条目
    pub async fn clear_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at < ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn clear_by_type(&self, cache_type: CacheType) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache WHERE type = ?")
            .bind(cache_type.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn clear_all(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// 命中直接返回；未命中调用一次 `producer`，写入后返回
    ///
    /// 查询失败按未命中处理，写入失败只记录日志，生产者的错误原样返回且不缓存
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        cache_type: CacheType,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        match self.get(key, cache_type).await {
            Ok(Some(value)) => {
                debug!("缓存命中: {}", key);
                return Ok(value);
            }
            Ok(None) => debug!("缓存未命中: {}", key),
            Err(e) => warn!("缓存查询失败，按未命中处理: {} - {}", key, e),
        }

        let value = producer().await?;

        if let Err(e) = self.set(key, &value, cache_type, ttl).await {
            warn!("缓存写入失败，跳过: {} - {}", key, e);
        }

        Ok(value)
    }

    /// `get_or_set` 的类型化版本，值以 JSON 存储
    ///
    /// 缓存中的值无法反序列化时按未命中处理
    pub async fn get_or_set_json<T, F, Fut, E>(
        &self,
        key: &str,
        cache_type: CacheType,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get(key, cache_type).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!("缓存命中: {}", key);
                    return Ok(value);
                }
                Err(e) => warn!("缓存内容无法解析，按未命中处理: {} - {}", key, e),
            },
            Ok(None) => debug!("缓存未命中: {}", key),
            Err(e) => warn!("缓存查询失败，按未命中处理: {} - {}", key, e),
        }

        let value = producer().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.set(key, &raw, cache_type, ttl).await {
                    warn!("缓存写入失败，跳过: {} - {}", key, e);
                }
            }
            Err(e) => warn!("缓存值序列化失败，跳过: {} - {}", key, e),
        }

        Ok(value)
    }

    /// 文本生成结果缓存
    pub async fn ai_cache<I, F, Fut, E>(&self, inputs: &I, producer: F) -> Result<String, E>
    where
        I: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let cache_type = CacheType::GenerationText;
        match KeyDeriver::derive("ai", inputs) {
            Ok(key) => {
                self.get_or_set(&key, cache_type, self.ttl.for_type(cache_type), producer)
                    .await
            }
            Err(e) => {
                warn!("缓存键生成失败，跳过缓存: {}", e);
                producer().await
            }
        }
    }

    /// 图片搜索结果缓存
    pub async fn image_cache<I, T, F, Fut, E>(&self, inputs: &I, producer: F) -> Result<T, E>
    where
        I: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cache_type = CacheType::Image;
        match KeyDeriver::derive("image", inputs) {
            Ok(key) => {
                self.get_or_set_json(&key, cache_type, self.ttl.for_type(cache_type), producer)
                    .await
            }
            Err(e) => {
                warn!("缓存键生成失败，跳过缓存: {}", e);
                producer().await
            }
        }
    }

    /// 按 (文本, 源语言, 目标语言) 缓存翻译结果
    ///
    /// 翻译服务本身使用独立的 `translation_cache` 表，这里是 `translation` 命名空间下的通用包装
    pub async fn translation_cache<F, Fut, E>(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        producer: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let cache_type = CacheType::Translation;
        let inputs = serde_json::json!({
            "text": text,
            "source": source_language,
            "target": target_language,
        });
        match KeyDeriver::derive("translation", &inputs) {
            Ok(key) => {
                self.get_or_set(&key, cache_type, self.ttl.for_type(cache_type), producer)
                    .await
            }
            Err(e) => {
                warn!("缓存键生成失败，跳过缓存: {}", e);
                producer().await
            }
        }
    }

    /// 各类型条目数与未清理的过期条目数
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT type, COUNT(*) FROM cache GROUP BY type")
                .fetch_all(&self.pool)
                .await?;

        let expired: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cache WHERE expires_at IS NOT NULL AND expires_at < ?",
        )
        .bind(now_millis())
        .fetch_one(&self.pool)
        .await?;

        let total = rows.iter().map(|(_, count)| count).sum();
        Ok(CacheStats {
            total,
            expired,
            by_type: rows.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn cache() -> ContentCache {
        let database = Database::in_memory().await.unwrap();
        ContentCache::new(database.pool().clone(), CacheTtlConfig::default())
    }

    #[tokio::test]
    async fn test_set_replaces_existing_entry() {
        let cache = cache().await;
        cache.set("k", "v1", CacheType::Other, None).await.unwrap();
        cache.set("k", "v2", CacheType::Other, None).await.unwrap();

        assert_eq!(cache.get("k", CacheType::Other).await.unwrap(), Some("v2".to_string()));
        assert_eq!(cache.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_same_key_different_types_are_separate() {
        let cache = cache().await;
        cache.set("k", "text", CacheType::GenerationText, None).await.unwrap();
        cache.set("k", "image", CacheType::Image, None).await.unwrap();

        assert_eq!(
            cache.get("k", CacheType::GenerationText).await.unwrap(),
            Some("text".to_string())
        );
        assert_eq!(cache.get("k", CacheType::Image).await.unwrap(), Some("image".to_string()));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let cache = cache().await;
        cache.set("k", "v", CacheType::Other, None).await.unwrap();

        assert!(cache.delete("k", CacheType::Other).await.unwrap());
        assert!(!cache.delete("k", CacheType::Other).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_entry_keeps_metadata() {
        let cache = cache().await;
        cache
            .set("k", "v", CacheType::Image, Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let entry = cache.get_entry("k", CacheType::Image).await.unwrap().unwrap();
        assert_eq!(entry.cache_type, CacheType::Image);
        let expires_at = entry.expires_at.unwrap();
        assert!(expires_at > entry.created_at);
    }

    #[tokio::test]
    async fn test_producer_error_is_not_cached() {
        let cache = cache().await;
        let calls = AtomicUsize::new(0);

        let result: Result<String, String> = cache
            .get_or_set("k", CacheType::Other, None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("backend down".to_string())
            })
            .await;
        assert_eq!(result, Err("backend down".to_string()));
        assert_eq!(cache.get("k", CacheType::Other).await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_json_round_trip() {
        let cache = cache().await;

        let first: Result<Vec<u32>, String> = cache
            .get_or_set_json("nums", CacheType::Other, None, || async { Ok(vec![1, 2, 3]) })
            .await;
        assert_eq!(first, Ok(vec![1, 2, 3]));

        let second: Result<Vec<u32>, String> = cache
            .get_or_set_json("nums", CacheType::Other, None, || async {
                Err("should not be called".to_string())
            })
            .await;
        assert_eq!(second, Ok(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_unparseable_json_is_a_miss() {
        let cache = cache().await;
        cache.set("nums", "not json", CacheType::Other, None).await.unwrap();

        let value: Result<Vec<u32>, String> = cache
            .get_or_set_json("nums", CacheType::Other, None, || async { Ok(vec![7]) })
            .await;
        assert_eq!(value, Ok(vec![7]));
        assert_eq!(cache.get("nums", CacheType::Other).await.unwrap(), Some("[7]".to_string()));
    }

    #[tokio::test]
    async fn test_stats_counts_expired_rows() {
        let cache = cache().await;
        cache
            .set("old", "v", CacheType::Image, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        cache.set("new", "v", CacheType::Translation, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.by_type.get("image"), Some(&1));
        assert_eq!(stats.by_type.get("translation"), Some(&1));
    }
}
