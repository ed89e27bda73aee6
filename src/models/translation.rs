use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 翻译缓存条目，按 (text, source_language, target_language) 直接寻址
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationCacheEntry {
    pub id: String,
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    pub translated_text: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// 语言检测结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedLanguage {
    pub language: String,
    pub confidence: f64,
}

/// 翻译后端支持的语言
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageInfo {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

impl LanguageInfo {
    /// 翻译后端不可用时返回的常用语言列表
    pub fn fallback_list() -> Vec<LanguageInfo> {
        [
            ("en", "English"),
            ("es", "Spanish"),
            ("fr", "French"),
            ("de", "German"),
            ("it", "Italian"),
            ("pt", "Portuguese"),
            ("ru", "Russian"),
            ("zh", "Chinese"),
            ("ja", "Japanese"),
            ("ko", "Korean"),
            ("ar", "Arabic"),
            ("hi", "Hindi"),
        ]
        .into_iter()
        .map(|(code, name)| LanguageInfo {
            code: code.to_string(),
            name: name.to_string(),
            targets: None,
        })
        .collect()
    }
}
