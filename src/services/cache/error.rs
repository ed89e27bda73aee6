// 缓存模块错误类型定义
//
// 缓存本身从不因未命中或过期而报错，这里只有存储层与序列化错误

use thiserror::Error;

/// 缓存操作的统一错误类型
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("未知的缓存类型: {0}")]
    UnknownType(String),
}
