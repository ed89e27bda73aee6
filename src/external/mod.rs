// 外部后端适配器
//
// 每个后端一个客户端：图片生成、图片搜索、浏览器刮削、翻译、文本生成。
// 客户端只负责协议本身，缓存与健康检查编排由 services 层完成。

pub mod browser;
pub mod error;
pub mod google_search;
pub mod libretranslate;
pub mod ollama;
pub mod scraper;
pub mod stable_diffusion;

pub use browser::{BrowserLauncher, BrowserSession, ChromeLauncher, ImageCandidate};
pub use error::BackendError;
pub use google_search::GoogleImageSearch;
pub use libretranslate::LibreTranslateClient;
pub use ollama::OllamaClient;
pub use scraper::{ImageScraper, RateLimiter};
pub use stable_diffusion::{ImageGenerator, StableDiffusionClient};
