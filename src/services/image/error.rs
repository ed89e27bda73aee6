// 图片处理模块错误类型定义

use thiserror::Error;

/// 图片处理的统一错误类型
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("源图片不存在: {0}")]
    SourceNotFound(String),

    #[error("无效的文件名: {0}")]
    InvalidFilename(String),

    #[error("图片解码失败: {0}")]
    Decode(String),

    #[error("图片编码失败: {0}")]
    Encode(String),

    #[error("无效的处理参数: {0}")]
    InvalidOptions(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("下载错误: {0}")]
    Download(#[from] DownloadError),
}

/// 下载相关错误
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("网络错误: {0}")]
    NetworkError(String),

    #[error("下载超时")]
    Timeout,

    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP 错误: 状态码 {0}")]
    HttpError(u16),
}

// 实现从 reqwest::Error 到 DownloadError 的转换
impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DownloadError::Timeout
        } else if let Some(status) = err.status() {
            DownloadError::HttpError(status.as_u16())
        } else {
            DownloadError::NetworkError(err.to_string())
        }
    }
}

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => ProcessingError::Io(e),
            image::ImageError::Encoding(e) => ProcessingError::Encode(e.to_string()),
            other => ProcessingError::Decode(other.to_string()),
        }
    }
}
