// 图片下载器
//
// 本模块提供远程图片下载到图片目录的功能，包括：
// - 超时控制
// - 失败重试
// - 按 Content-Type 推断扩展名

use super::error::{DownloadError, ProcessingError};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::external::scraper::DESKTOP_USER_AGENT;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;

/// 图片下载器
#[derive(Clone)]
pub struct ImageDownloader {
    client: Client,

    /// 图片目录
    images_dir: PathBuf,

    /// 重试间隔
    retry_delay: Duration,
}

impl ImageDownloader {
    pub fn new(images_dir: PathBuf) -> Result<Self, ProcessingError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10) // 每个主机最多保持 10 个空闲连接
            .pool_idle_timeout(Duration::from_secs(90)) // 空闲连接超时 90 秒
            .build()
            .map_err(|e| {
                ProcessingError::Download(DownloadError::NetworkError(format!(
                    "创建 HTTP 客户端失败: {}",
                    e
                )))
            })?;

        Ok(Self {
            client,
            images_dir,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// 修改重试间隔
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// 下载图片到图片目录
    ///
    /// # 参数
    /// - `url`: 图片 URL（仅支持 http / https）
    ///
    /// # 返回
    /// - `Ok(String)`: 保存的文件名 `dl_<uuid>.<ext>`
    /// - `Err(ProcessingError)`: 下载失败
    ///
    /// # 重试
    /// - 最多尝试 3 次
    /// - 4xx 响应不重试
    pub async fn download(&self, url: &str) -> Result<String, ProcessingError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidUrl(url.to_string()).into());
        }

        debug!("开始下载图片: {}", url);

        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.download_once(url).await {
                Ok(filename) => {
                    info!(
                        "图片下载成功: {} -> {} (尝试 {}/{})",
                        url, filename, attempt, MAX_ATTEMPTS
                    );
                    return Ok(filename);
                }
                Err(e) => {
                    warn!(
                        "图片下载失败 (尝试 {}/{}): {} - 错误: {:?}",
                        attempt, MAX_ATTEMPTS, url, e
                    );
                    let retryable = !matches!(
                        e,
                        ProcessingError::Download(DownloadError::HttpError(status)) if (400..500).contains(&status)
                    );
                    last_error = Some(e);

                    if !retryable {
                        break;
                    }
                    // 如果不是最后一次尝试，等待后重试
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            ProcessingError::Download(DownloadError::NetworkError("未知错误".to_string()))
        });

        error!("图片下载失败: {} - 错误: {:?}", url, error);
        Err(error)
    }

    /// 执行一次下载（内部方法）
    async fn download_once(&self, url: &str) -> Result<String, ProcessingError> {
        let (bytes, content_type) = match timeout(DOWNLOAD_TIMEOUT, self.fetch(url)).await {
            Ok(result) => result?,
            Err(_) => return Err(DownloadError::Timeout.into()),
        };

        let filename = format!(
            "dl_{}.{}",
            Uuid::new_v4(),
            extension_for_content_type(content_type.as_deref())
        );

        fs::create_dir_all(&self.images_dir).await?;
        fs::write(self.images_dir.join(&filename), bytes).await?;

        Ok(filename)
    }

    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, Option<String>), DownloadError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, DESKTOP_USER_AGENT)
            .send()
            .await?;

        // 检查 HTTP 状态码
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpError(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }
}

/// 由 Content-Type 推断扩展名，未知类型按 jpg 处理
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase());

    match mime.as_deref() {
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type(Some("image/png")), "png");
        assert_eq!(extension_for_content_type(Some("image/webp; charset=binary")), "webp");
        assert_eq!(extension_for_content_type(Some("IMAGE/GIF")), "gif");
        assert_eq!(extension_for_content_type(Some("image/jpeg")), "jpg");
        assert_eq!(extension_for_content_type(Some("text/html")), "jpg");
        assert_eq!(extension_for_content_type(None), "jpg");
    }

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let downloader = ImageDownloader::new(temp_dir.path().to_path_buf()).unwrap();

        let result = downloader.download("file:///etc/passwd").await;
        assert!(matches!(
            result,
            Err(ProcessingError::Download(DownloadError::InvalidUrl(_)))
        ));
    }
}
