// 无头浏览器抽象
//
// 刮削逻辑只依赖 BrowserLauncher / BrowserSession 两个 trait，
// 生产环境由 headless_chrome 实现，测试中可替换为假实现。
// 两个 trait 的方法都是阻塞调用，调用方需放到 spawn_blocking 中执行。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use serde::Deserialize;

use super::error::BackendError;

/// 页面中提取到的候选图片
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ImageCandidate {
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

pub trait BrowserSession: Send + Sync {
    /// 打开一个新标签页，访问 `url` 并提取所有 `img` 元素，完成后关闭标签页
    fn collect_images(&self, url: &str, user_agent: &str) -> Result<Vec<ImageCandidate>, BackendError>;

    /// 关闭浏览器进程
    fn close(&self);
}

pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Arc<dyn BrowserSession>, BackendError>;
}

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);

const EXTRACT_IMAGES_SCRIPT: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('img')).map(img => ({
    src: img.src || (img.dataset && img.dataset.src) || '',
    alt: img.alt || ''
})))
"#;

/// 启动本机 Chrome / Chromium
pub struct ChromeLauncher;

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Arc<dyn BrowserSession>, BackendError> {
        tracing::info!("Initializing headless browser for image scraping...");

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1920, 1080)))
            .args(vec![std::ffi::OsStr::new(
                "--disable-blink-features=AutomationControlled",
            )])
            .build()
            .map_err(|e| BackendError::Configuration(format!("浏览器启动参数无效: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| BackendError::ServiceUnavailable(format!("浏览器启动失败: {}", e)))?;

        tracing::info!("Headless browser initialized");
        Ok(Arc::new(ChromeSession {
            browser: Mutex::new(Some(browser)),
        }))
    }
}

pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
}

impl ChromeSession {
    fn scrape_tab(
        tab: &headless_chrome::Tab,
        url: &str,
        user_agent: &str,
    ) -> anyhow::Result<Vec<ImageCandidate>> {
        tab.set_default_timeout(NAVIGATION_TIMEOUT);
        tab.set_user_agent(user_agent, None, None)?;
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;
        tab.wait_for_element_with_custom_timeout("img", ELEMENT_TIMEOUT)?;

        let result = tab.evaluate(EXTRACT_IMAGES_SCRIPT, false)?;
        let raw = result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("页面脚本未返回结果"))?;

        Ok(serde_json::from_str(raw)?)
    }
}

impl BrowserSession for ChromeSession {
    fn collect_images(&self, url: &str, user_agent: &str) -> Result<Vec<ImageCandidate>, BackendError> {
        let tab = {
            let guard = self.browser.lock().unwrap_or_else(|e| e.into_inner());
            let browser = guard
                .as_ref()
                .ok_or_else(|| BackendError::ServiceUnavailable("浏览器已关闭".to_string()))?;
            browser
                .new_tab()
                .map_err(|e| BackendError::ServiceUnavailable(format!("无法打开标签页: {}", e)))?
        };

        let result = Self::scrape_tab(&tab, url, user_agent);

        // 只关闭标签页，浏览器保持运行
        if let Err(e) = tab.close(true) {
            tracing::warn!("关闭标签页失败: {}", e);
        }

        result.map_err(|e| BackendError::Backend(format!("页面抓取失败: {}", e)))
    }

    fn close(&self) {
        let browser = self.browser.lock().unwrap_or_else(|e| e.into_inner()).take();
        if browser.is_some() {
            // Browser 被 drop 时结束进程
            drop(browser);
            tracing::info!("Headless browser closed");
        }
    }
}
