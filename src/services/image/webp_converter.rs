// WebP 编码
//
// 本模块提供：
// - 有损编码（按质量）
// - 异步接口（CPU 密集型操作放到阻塞线程池）

use super::error::ProcessingError;
use image::DynamicImage;
use tokio::task;

/// WebP 转换器
pub struct WebPConverter;

impl WebPConverter {
    /// 有损编码
    ///
    /// # 参数
    /// - `img`: 已解码的图片
    /// - `quality`: 1-100
    pub fn encode_lossy(img: &DynamicImage, quality: u8) -> Vec<u8> {
        // 转换为 RGBA8
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let encoder = webp::Encoder::from_rgba(&rgba, width, height);
        encoder.encode(f32::from(quality.clamp(1, 100))).to_vec()
    }

    /// 将任意可识别格式的图片数据转换为 WebP
    pub fn convert_to_webp(image_data: &[u8], quality: u8) -> Result<Vec<u8>, ProcessingError> {
        let img = image::load_from_memory(image_data)
            .map_err(|e| ProcessingError::Decode(format!("无法识别图片格式: {}", e)))?;

        Ok(Self::encode_lossy(&img, quality))
    }

    /// 异步转换
    ///
    /// 使用 `tokio::task::spawn_blocking` 将编码移到阻塞线程池，避免阻塞异步运行时
    pub async fn convert_to_webp_async(
        image_data: Vec<u8>,
        quality: u8,
    ) -> Result<Vec<u8>, ProcessingError> {
        task::spawn_blocking(move || Self::convert_to_webp(&image_data, quality))
            .await
            .map_err(|e| ProcessingError::Encode(format!("任务执行失败: {}", e)))?
    }
}
