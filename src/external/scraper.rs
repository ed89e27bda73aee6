// 浏览器图片刮削
//
// - 两次刮削之间有最小间隔，冷却期内的调用立即返回 RateLimited
// - 浏览器在第一次刮削时启动并一直保留，直到 close()
// - 每次刮削使用一个临时标签页

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use regex::Regex;
use url::Url;

use super::browser::{BrowserLauncher, BrowserSession, ImageCandidate};
use super::error::BackendError;
use crate::models::ImageSearchResult;

pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// 调用间隔限制
///
/// 检查与更新在同一把锁内完成；时间戳在调用被放行时记录，而不是在调用结束时
pub struct RateLimiter {
    cooldown: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_call: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 冷却期外放行并记录时间；冷却期内返回剩余等待时间
    pub fn try_acquire(&self) -> Result<(), BackendError> {
        let mut last_call = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if let Some(last) = *last_call {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cooldown {
                return Err(BackendError::RateLimited {
                    retry_after: self.cooldown - elapsed,
                });
            }
        }

        *last_call = Some(now);
        Ok(())
    }
}

pub struct ImageScraper {
    launcher: Arc<dyn BrowserLauncher>,
    browser: tokio::sync::Mutex<Option<Arc<dyn BrowserSession>>>,
    limiter: RateLimiter,
    search_url: String,
}

impl ImageScraper {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        cooldown: Duration,
        search_url: impl Into<String>,
    ) -> Self {
        Self {
            launcher,
            browser: tokio::sync::Mutex::new(None),
            limiter: RateLimiter::new(cooldown),
            search_url: search_url.into(),
        }
    }

    /// 刮削图片搜索结果页
    ///
    /// # 参数
    /// - `query`: 搜索词
    /// - `count`: 最多返回的结果数
    ///
    /// # 返回
    /// - `Err(BackendError::RateLimited)`: 距上次刮削不足冷却时间
    pub async fn scrape_images(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<ImageSearchResult>, BackendError> {
        self.limiter.try_acquire()?;

        let url = Url::parse_with_params(&self.search_url, &[("q", query), ("tbm", "isch")])
            .map_err(|e| BackendError::Configuration(format!("无效的搜索地址: {}", e)))?;

        let session = self.ensure_browser().await?;
        tracing::info!("Scraping images for: {}", query);

        let worker = Arc::clone(&session);
        let collected = tokio::task::spawn_blocking(move || {
            worker.collect_images(url.as_str(), DESKTOP_USER_AGENT)
        })
        .await
        .map_err(|e| BackendError::Backend(format!("刮削任务执行失败: {}", e)))?;

        let candidates = match collected {
            Ok(candidates) => candidates,
            Err(e @ BackendError::ServiceUnavailable(_)) => {
                // 浏览器已失效，丢弃后下一次刮削重新启动
                tracing::warn!("浏览器不可用，将在下次刮削时重新启动: {}", e);
                self.discard_browser(&session).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let results = filter_candidates(candidates, count);
        tracing::info!("Scraped {} images for: {}", results.len(), query);
        Ok(results)
    }

    /// 延迟启动浏览器
    async fn ensure_browser(&self) -> Result<Arc<dyn BrowserSession>, BackendError> {
        let mut guard = self.browser.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(Arc::clone(session));
        }

        let launcher = Arc::clone(&self.launcher);
        let session = tokio::task::spawn_blocking(move || launcher.launch())
            .await
            .map_err(|e| BackendError::ServiceUnavailable(format!("浏览器启动任务失败: {}", e)))??;

        *guard = Some(Arc::clone(&session));
        Ok(session)
    }

    /// 丢弃失效的会话；若缓存中已是另一个会话则不处理
    async fn discard_browser(&self, session: &Arc<dyn BrowserSession>) {
        let stale = {
            let mut guard = self.browser.lock().await;
            match guard.as_ref() {
                Some(current) if Arc::ptr_eq(current, session) => guard.take(),
                _ => None,
            }
        };

        if let Some(stale) = stale {
            if let Err(e) = tokio::task::spawn_blocking(move || stale.close()).await {
                tracing::warn!("关闭失效浏览器失败: {}", e);
            }
        }
    }

    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// 关闭浏览器（如果已启动）
    pub async fn close(&self) {
        let session = self.browser.lock().await.take();
        if let Some(session) = session {
            if let Err(e) = tokio::task::spawn_blocking(move || session.close()).await {
                tracing::warn!("关闭浏览器失败: {}", e);
            }
        }
    }
}

// Google 页面自带的 logo 与界面素材
fn branding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(gstatic\.com|/images/branding/|googlelogo|/logos/doodles/)")
            .expect("branding pattern is valid")
    })
}

/// 过滤占位图与站内素材，截断到 `count`
pub fn filter_candidates(candidates: Vec<ImageCandidate>, count: usize) -> Vec<ImageSearchResult> {
    candidates
        .into_iter()
        .filter(|candidate| is_usable_source(&candidate.src))
        .take(count)
        .map(|candidate| {
            let title = if candidate.alt.trim().is_empty() {
                "Image".to_string()
            } else {
                candidate.alt
            };
            ImageSearchResult {
                url: candidate.src.clone(),
                thumbnail: candidate.src,
                title,
            }
        })
        .collect()
}

fn is_usable_source(src: &str) -> bool {
    let Ok(url) = Url::parse(src) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https") && !branding_pattern().is_match(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(src: &str, alt: &str) -> ImageCandidate {
        ImageCandidate {
            src: src.to_string(),
            alt: alt.to_string(),
        }
    }

    #[test]
    fn test_filter_drops_placeholders() {
        let candidates = vec![
            candidate("data:image/gif;base64,R0lGODlhAQABAAAAACw=", ""),
            candidate("https://encrypted-tbn0.gstatic.com/images?q=tbn:abc", "thumb"),
            candidate("https://www.google.com/images/branding/googlelogo/2x/googlelogo.png", "Google"),
            candidate("/relative/path.png", ""),
            candidate("https://example.com/cat.jpg", "A cat"),
            candidate("http://example.com/dog.png", ""),
        ];

        let results = filter_candidates(candidates, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://example.com/cat.jpg");
        assert_eq!(results[0].title, "A cat");
        assert_eq!(results[1].title, "Image");
        assert_eq!(results[1].thumbnail, "http://example.com/dog.png");
    }

    #[test]
    fn test_filter_truncates() {
        let candidates = (0..20)
            .map(|i| candidate(&format!("https://example.com/{}.jpg", i), ""))
            .collect();
        assert_eq!(filter_candidates(candidates, 5).len(), 5);
    }

    #[test]
    fn test_rate_limiter_window() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        assert!(limiter.try_acquire().is_ok());

        match limiter.try_acquire() {
            Err(BackendError::RateLimited { retry_after }) => {
                assert!(retry_after <= Duration::from_millis(50));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn test_rate_limiter_zero_cooldown() {
        let limiter = RateLimiter::new(Duration::ZERO);
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
    }
}
