use serde::{Deserialize, Serialize};

/// 图片搜索结果（API 搜索与浏览器刮削共用）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSearchResult {
    pub url: String,
    pub title: String,
    pub thumbnail: String,
}

/// 输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }
}

/// 缩放参数（等比缩放到框内，不放大）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ResizeOptions {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// 滤镜参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ImageFilters {
    #[serde(default)]
    pub grayscale: bool,
    /// 高斯模糊 sigma
    #[serde(default)]
    pub blur: Option<f32>,
    #[serde(default)]
    pub sharpen: bool,
    /// 旋转角度（90 的整数倍）
    #[serde(default)]
    pub rotate: Option<i32>,
}

/// 图片处理参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ProcessOptions {
    #[serde(default)]
    pub resize: Option<ResizeOptions>,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub format: Option<ImageFormat>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub filters: Option<ImageFilters>,
}

impl ProcessOptions {
    /// 实际使用的编码质量：显式值优先，否则压缩模式 80，默认 90
    pub fn effective_quality(&self) -> u8 {
        self.quality
            .unwrap_or(if self.compress { 80 } else { 90 })
            .clamp(1, 100)
    }

    pub fn effective_format(&self) -> ImageFormat {
        self.format.unwrap_or_default()
    }
}
