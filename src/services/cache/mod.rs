// 缓存模块 - 后端调用结果的持久化缓存
//
// 本模块提供：
// - 基于 SQLite 的通用内容缓存（按命名空间设置 TTL，惰性过期）
// - 确定性的缓存键生成
// - 翻译结果缓存
// - 定期过期清理

pub mod cleanup;
pub mod content_cache;
pub mod error;
pub mod key;
pub mod translation_cache;

pub use cleanup::{CacheCleanupTask, CleanupReport};
pub use content_cache::{CacheStats, ContentCache};
pub use error::CacheError;
pub use key::KeyDeriver;
pub use translation_cache::TranslationCache;

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// 当前时间（Unix 毫秒），数据库中的时间戳均使用此格式
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn expires_at_from(now: i64, ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|ttl| now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)))
}

pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}
