// 应用配置
//
// 所有配置均来自环境变量（启动时由 dotenv 加载 .env），包括：
// - 服务监听地址与数据库路径
// - 各外部后端的基础 URL 与超时
// - 图片搜索凭据
// - 刮削冷却时间
// - 各命名空间的缓存 TTL

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::CacheType;

const DAY_SECS: u64 = 24 * 60 * 60;

/// 各命名空间的默认缓存有效期
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTtlConfig {
    pub generation_text: Duration,
    pub image: Duration,
    pub translation: Duration,
    pub language_detection: Duration,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            generation_text: Duration::from_secs(7 * DAY_SECS),
            image: Duration::from_secs(30 * DAY_SECS),
            translation: Duration::from_secs(90 * DAY_SECS),
            language_detection: Duration::from_secs(30 * DAY_SECS),
        }
    }
}

impl CacheTtlConfig {
    /// 获取某个类型的默认 TTL，`Other` 永不过期
    pub fn for_type(&self, cache_type: CacheType) -> Option<Duration> {
        match cache_type {
            CacheType::GenerationText => Some(self.generation_text),
            CacheType::Image => Some(self.image),
            CacheType::Translation => Some(self.translation),
            CacheType::LanguageDetection => Some(self.language_detection),
            CacheType::Other => None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// 生成、下载、处理后图片的存放目录
    pub images_dir: PathBuf,

    pub sd_webui_url: String,
    pub sd_timeout: Duration,
    pub ollama_url: String,
    pub ollama_model: String,
    pub libretranslate_url: String,

    pub google_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
    pub google_search_url: String,

    /// 两次刮削之间的最小间隔
    pub scrape_cooldown: Duration,
    pub scrape_search_url: String,

    pub cache_ttl: CacheTtlConfig,
    pub cache_cleanup_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: "sqlite:./presentation.db?mode=rwc".to_string(),
            images_dir: PathBuf::from("./data/images"),
            sd_webui_url: "http://127.0.0.1:7860".to_string(),
            sd_timeout: Duration::from_secs(120),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            libretranslate_url: "http://localhost:5000".to_string(),
            google_api_key: None,
            google_search_engine_id: None,
            google_search_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            scrape_cooldown: Duration::from_millis(2000),
            scrape_search_url: "https://www.google.com/search".to_string(),
            cache_ttl: CacheTtlConfig::default(),
            cache_cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl AppConfig {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: env_string("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            database_url: env_string("DATABASE_URL").unwrap_or(defaults.database_url),
            images_dir: env_string("IMAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.images_dir),
            sd_webui_url: env_string("SD_WEBUI_URL").unwrap_or(defaults.sd_webui_url),
            sd_timeout: env_parse("SD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sd_timeout),
            ollama_url: env_string("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: env_string("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            libretranslate_url: env_string("LIBRETRANSLATE_URL")
                .unwrap_or(defaults.libretranslate_url),
            google_api_key: env_string("GOOGLE_API_KEY"),
            google_search_engine_id: env_string("GOOGLE_SEARCH_ENGINE_ID"),
            google_search_url: env_string("GOOGLE_SEARCH_URL")
                .unwrap_or(defaults.google_search_url),
            scrape_cooldown: env_parse("SCRAPE_COOLDOWN_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.scrape_cooldown),
            scrape_search_url: env_string("SCRAPE_SEARCH_URL")
                .unwrap_or(defaults.scrape_search_url),
            cache_ttl: CacheTtlConfig {
                generation_text: env_parse("CACHE_TTL_AI_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache_ttl.generation_text),
                image: env_parse("CACHE_TTL_IMAGE_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache_ttl.image),
                translation: env_parse("CACHE_TTL_TRANSLATION_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache_ttl.translation),
                language_detection: env_parse("CACHE_TTL_DETECTION_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache_ttl.language_detection),
            },
            cache_cleanup_interval: env_parse("CACHE_CLEANUP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_cleanup_interval),
        }
    }

    /// 搜索凭据是否齐全
    pub fn google_search_configured(&self) -> bool {
        self.google_api_key.is_some() && self.google_search_engine_id.is_some()
    }
}

/// 读取非空环境变量
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 读取并解析环境变量，解析失败时记录警告并返回 None
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("环境变量 {} 的值无效: {}，使用默认值", name, raw);
            None
        }
    }
}
