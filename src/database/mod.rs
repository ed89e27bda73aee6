use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::str::FromStr;

pub mod schema;

pub use schema::DatabaseStats;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// 连接数据库并执行迁移
    ///
    /// 支持文件数据库（`sqlite:./presentation.db?mode=rwc`）和内存数据库（`sqlite::memory:`）
    pub async fn connect(database_url: &str) -> Result<Self> {
        tracing::info!("Connecting to database: {}", database_url);

        // 配置 SQLite 连接选项
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(30)); // 设置忙等待超时

        // SQLite 单写入者，限制为 1 个连接；连接常驻，内存数据库不会因回收而丢失
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        schema::verify_schema(&pool).await?;

        // 启动时清理一次过期缓存
        schema::cleanup_expired_cache(&pool).await?;

        let stats = schema::get_database_stats(&pool).await?;
        tracing::info!(
            "Database initialized - Cache entries: {}, Translations: {}, Size: {:.2} MB",
            stats.cache_count,
            stats.translation_count,
            stats.database_size_mb()
        );

        Ok(Self { pool })
    }

    /// 内存数据库（测试用）
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// 获取数据库统计信息
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        schema::get_database_stats(&self.pool).await
    }

    /// 验证数据库完整性
    pub async fn verify_integrity(&self) -> Result<()> {
        schema::verify_schema(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_initializes() {
        let database = Database::in_memory().await.unwrap();
        database.verify_integrity().await.unwrap();

        let stats = database.get_stats().await.unwrap();
        assert_eq!(stats.cache_count, 0);
        assert_eq!(stats.translation_count, 0);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let url = format!(
            "sqlite:{}?mode=rwc",
            temp_dir.path().join("test.db").display()
        );

        let database = Database::connect(&url).await.unwrap();
        sqlx::query(
            "INSERT INTO cache (id, key, value, type, created_at, expires_at) VALUES ('1', 'k', 'v', 'other', 0, NULL)",
        )
        .execute(database.pool())
        .await
        .unwrap();
        database.close().await;

        let reopened = Database::connect(&url).await.unwrap();
        assert_eq!(reopened.get_stats().await.unwrap().cache_count, 1);
    }
}
