use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 缓存条目类型（同时作为命名空间）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CacheType {
    /// 文本生成结果
    GenerationText,
    /// 图片搜索 / 生成结果
    Image,
    /// 翻译结果
    Translation,
    /// 语言检测结果
    LanguageDetection,
    /// 其他
    Other,
}

impl CacheType {
    pub const ALL: [CacheType; 5] = [
        CacheType::GenerationText,
        CacheType::Image,
        CacheType::Translation,
        CacheType::LanguageDetection,
        CacheType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::GenerationText => "generation-text",
            CacheType::Image => "image",
            CacheType::Translation => "translation",
            CacheType::LanguageDetection => "language-detection",
            CacheType::Other => "other",
        }
    }
}

impl FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // "ai" 是早期客户端使用的名称
            "generation-text" | "ai" => Ok(CacheType::GenerationText),
            "image" => Ok(CacheType::Image),
            "translation" => Ok(CacheType::Translation),
            "language-detection" => Ok(CacheType::LanguageDetection),
            "other" => Ok(CacheType::Other),
            _ => Err(format!("未知的缓存类型: {}", s)),
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 缓存条目
///
/// `(key, cache_type)` 唯一；`expires_at` 为 None 表示永不过期
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// 在给定时间点是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now)
    }
}
