// 图片模块 - 图片文件处理
//
// 本模块提供：
// - 缩放、滤镜与格式转换
// - 大文件压缩
// - 浅色背景去除
// - 远程图片下载与生成结果落盘

pub mod downloader;
pub mod error;
pub mod pipeline;
pub mod webp_converter;

pub use downloader::ImageDownloader;
pub use error::{DownloadError, ProcessingError};
pub use pipeline::{ImagePipeline, DEFAULT_COMPRESS_THRESHOLD_MB};
pub use webp_converter::WebPConverter;
