use anyhow::Result;
use sqlx::{Pool, Sqlite};

/// 验证数据库schema完整性
pub async fn verify_schema(pool: &Pool<Sqlite>) -> Result<()> {
    let required_tables = ["cache", "translation_cache"];

    for table in required_tables {
        let exists = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
            .bind(table)
            .fetch_optional(pool)
            .await?;

        if exists.is_none() {
            return Err(anyhow::anyhow!("Required table '{}' does not exist", table));
        }
    }

    let required_indexes = [
        "idx_cache_type",
        "idx_cache_expires_at",
        "idx_translation_cache_expires_at",
    ];

    for index in required_indexes {
        let exists = sqlx::query("SELECT name FROM sqlite_master WHERE type='index' AND name=?")
            .bind(index)
            .fetch_optional(pool)
            .await?;

        if exists.is_none() {
            return Err(anyhow::anyhow!("Required index '{}' does not exist", index));
        }
    }

    tracing::info!("Database schema verification completed successfully");
    Ok(())
}

/// 获取数据库统计信息
pub async fn get_database_stats(pool: &Pool<Sqlite>) -> Result<DatabaseStats> {
    let cache_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache")
        .fetch_one(pool)
        .await?;

    let translation_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM translation_cache")
        .fetch_one(pool)
        .await?;

    // 获取数据库文件大小
    let db_size: i64 = sqlx::query_scalar(
        "SELECT page_count * page_size as size FROM pragma_page_count(), pragma_page_size()",
    )
    .fetch_one(pool)
    .await?;

    Ok(DatabaseStats {
        cache_count,
        translation_count,
        database_size_bytes: db_size,
    })
}

/// 清理两张缓存表中已过期的数据
pub async fn cleanup_expired_cache(pool: &Pool<Sqlite>) -> Result<u64> {
    let now = chrono::Utc::now().timestamp_millis();

    let cache = sqlx::query("DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    let translations = sqlx::query(
        "DELETE FROM translation_cache WHERE expires_at IS NOT NULL AND expires_at < ?",
    )
    .bind(now)
    .execute(pool)
    .await?;

    let removed = cache.rows_affected() + translations.rows_affected();
    tracing::info!("Cleaned up {} expired cache entries", removed);
    Ok(removed)
}

/// 数据库统计信息
#[derive(Debug)]
pub struct DatabaseStats {
    pub cache_count: i64,
    pub translation_count: i64,
    pub database_size_bytes: i64,
}

impl DatabaseStats {
    pub fn database_size_mb(&self) -> f64 {
        self.database_size_bytes as f64 / (1024.0 * 1024.0)
    }
}
