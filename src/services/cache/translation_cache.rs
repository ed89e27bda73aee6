// 翻译缓存（SQLite 表 `translation_cache`）
//
// 按 (原文, 源语言, 目标语言) 直接寻址，不经过 KeyDeriver

use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::CacheError;
use super::{expires_at_from, millis_to_datetime, now_millis};
use crate::models::TranslationCacheEntry;

#[derive(sqlx::FromRow)]
struct TranslationRow {
    id: String,
    text: String,
    source_language: String,
    target_language: String,
    translated_text: String,
    created_at: i64,
    expires_at: Option<i64>,
}

impl From<TranslationRow> for TranslationCacheEntry {
    fn from(row: TranslationRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            source_language: row.source_language,
            target_language: row.target_language,
            translated_text: row.translated_text,
            created_at: millis_to_datetime(row.created_at),
            expires_at: row.expires_at.map(millis_to_datetime),
        }
    }
}

#[derive(Clone)]
pub struct TranslationCache {
    pool: SqlitePool,
}

impl TranslationCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_entry(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<TranslationCacheEntry>, CacheError> {
        let row = sqlx::query_as::<_, TranslationRow>(
            r#"
            SELECT id, text, source_language, target_language, translated_text, created_at, expires_at
            FROM translation_cache
            WHERE text = ? AND source_language = ? AND target_language = ?
            "#,
        )
        .bind(text)
        .bind(source_language)
        .bind(target_language)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if matches!(row.expires_at, Some(expires_at) if expires_at < now_millis()) {
            debug!("翻译缓存已过期，删除: {} -> {}", source_language, target_language);
            if let Err(e) = sqlx::query("DELETE FROM translation_cache WHERE id = ?")
                .bind(&row.id)
                .execute(&self.pool)
                .await
            {
                warn!("删除过期翻译缓存失败: {} -> {} - {}", source_language, target_language, e);
            }
            return Ok(None);
        }

        Ok(Some(row.into()))
    }

    /// 读取译文，过期条目会被删除
    pub async fn get(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<Option<String>, CacheError> {
        Ok(self
            .get_entry(text, source_language, target_language)
            .await?
            .map(|entry| entry.translated_text))
    }

    pub async fn set(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        translated_text: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let now = now_millis();

        sqlx::query(
            r#"
            INSERT INTO translation_cache
                (id, text, source_language, target_language, translated_text, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(text, source_language, target_language) DO UPDATE SET
                translated_text = excluded.translated_text,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(text)
        .bind(source_language)
        .bind(target_language)
        .bind(translated_text)
        .bind(now)
        .bind(expires_at_from(now, ttl))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn clear_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query(
            "DELETE FROM translation_cache WHERE expires_at IS NOT NULL AND expires_at < ?",
        )
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn clear_all(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM translation_cache")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64, CacheError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM translation_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn cache() -> TranslationCache {
        let database = Database::in_memory().await.unwrap();
        TranslationCache::new(database.pool().clone())
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = cache().await;
        cache.set("Hello", "en", "es", "Hola", None).await.unwrap();

        assert_eq!(cache.get("Hello", "en", "es").await.unwrap(), Some("Hola".to_string()));
        assert_eq!(cache.get("Hello", "en", "fr").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_conflict_replaces_translation() {
        let cache = cache().await;
        cache.set("Hello", "en", "es", "Hola", None).await.unwrap();
        cache.set("Hello", "en", "es", "¡Hola!", None).await.unwrap();

        assert_eq!(cache.count().await.unwrap(), 1);
        assert_eq!(cache.get("Hello", "en", "es").await.unwrap(), Some("¡Hola!".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        let cache = cache().await;
        cache
            .set("Hello", "en", "de", "Hallo", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.get("Hello", "en", "de").await.unwrap(), None);
        assert_eq!(cache.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_expired_keeps_live_rows() {
        let cache = cache().await;
        cache
            .set("a", "en", "es", "x", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        cache.set("b", "en", "es", "y", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.clear_expired().await.unwrap(), 1);
        assert_eq!(cache.count().await.unwrap(), 1);
        assert_eq!(cache.clear_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expired_read_survives_delete_failure() {
        let cache = cache().await;
        cache
            .set("Hello", "en", "it", "Ciao", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        sqlx::query(
            "CREATE TRIGGER block_delete BEFORE DELETE ON translation_cache \
             BEGIN SELECT RAISE(ABORT, 'store write failure'); END",
        )
        .execute(&cache.pool)
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.get("Hello", "en", "it").await.unwrap(), None);
        // 行仍在表中，等待定期清理
        assert_eq!(cache.count().await.unwrap(), 1);
    }
}
