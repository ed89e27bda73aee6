// 图片处理流水线
//
// 所有文件都位于同一个图片目录下，对外只暴露文件名。
// 处理顺序固定：缩放 -> 滤镜 -> 编码

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, Rgba};
use tokio::fs;
use tokio::task;
use uuid::Uuid;

use super::downloader::ImageDownloader;
use super::error::ProcessingError;
use super::webp_converter::WebPConverter;
use crate::models::{ImageFilters, ImageFormat, ProcessOptions, ResizeOptions};

/// 背景判定阈值：RGB 三个通道都严格大于该值
const BACKGROUND_THRESHOLD: u8 = 240;
const COMPRESS_QUALITY: u8 = 75;
/// 默认压缩阈值（MB）
pub const DEFAULT_COMPRESS_THRESHOLD_MB: f64 = 10.0;

#[derive(Clone)]
pub struct ImagePipeline {
    images_dir: PathBuf,
    downloader: ImageDownloader,
}

impl ImagePipeline {
    /// 创建流水线并确保图片目录存在
    pub async fn new(images_dir: impl Into<PathBuf>) -> Result<Self, ProcessingError> {
        let images_dir = images_dir.into();
        fs::create_dir_all(&images_dir).await?;

        let downloader = ImageDownloader::new(images_dir.clone())?;
        Ok(Self {
            images_dir,
            downloader,
        })
    }

    pub fn with_downloader(mut self, downloader: ImageDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// 文件名 -> 图片目录下的路径，拒绝任何可能跳出目录的名字
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, ProcessingError> {
        let invalid = filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
            || filename.contains('\0');

        if invalid {
            return Err(ProcessingError::InvalidFilename(filename.to_string()));
        }

        Ok(self.images_dir.join(filename))
    }

    async fn read_source(&self, filename: &str) -> Result<Vec<u8>, ProcessingError> {
        let path = self.resolve(filename)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProcessingError::SourceNotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_output(&self, filename: &str, data: &[u8]) -> Result<(), ProcessingError> {
        fs::write(self.images_dir.join(filename), data).await?;
        Ok(())
    }

    /// 按参数处理图片
    ///
    /// # 返回
    /// - `Ok(String)`: 新文件名 `processed_<uuid>.<format>`
    pub async fn process_image(
        &self,
        filename: &str,
        options: &ProcessOptions,
    ) -> Result<String, ProcessingError> {
        validate_options(options)?;
        let data = self.read_source(filename).await?;

        let options = *options;
        let encoded = task::spawn_blocking(move || transform(&data, &options))
            .await
            .map_err(|e| ProcessingError::Encode(format!("任务执行失败: {}", e)))??;

        let output = format!(
            "processed_{}.{}",
            Uuid::new_v4(),
            options.effective_format().extension()
        );
        self.write_output(&output, &encoded).await?;

        tracing::debug!("图片处理完成: {} -> {}", filename, output);
        Ok(output)
    }

    /// 文件超过阈值（MB）时重新编码为 WebP，否则原样返回文件名
    pub async fn compress_if_large(
        &self,
        filename: &str,
        threshold_mb: f64,
    ) -> Result<String, ProcessingError> {
        let path = self.resolve(filename)?;
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProcessingError::SourceNotFound(filename.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
        if size_mb <= threshold_mb {
            return Ok(filename.to_string());
        }

        tracing::info!(
            "Compressing large image: {:.2}MB > {}MB",
            size_mb,
            threshold_mb
        );

        let data = fs::read(&path).await?;
        let encoded = WebPConverter::convert_to_webp_async(data, COMPRESS_QUALITY).await?;

        let output = format!("processed_{}.{}", Uuid::new_v4(), ImageFormat::Webp.extension());
        self.write_output(&output, &encoded).await?;
        Ok(output)
    }

    /// 去除浅色背景
    ///
    /// 基于亮度阈值，只适用于接近纯色的浅色背景
    pub async fn remove_background(&self, filename: &str) -> Result<String, ProcessingError> {
        let data = self.read_source(filename).await?;

        let encoded = task::spawn_blocking(move || -> Result<Vec<u8>, ProcessingError> {
            let img = image::load_from_memory(&data)?;
            let masked = DynamicImage::ImageRgba8(background_mask(&img));
            encode(&masked, ImageFormat::Png, 100)
        })
        .await
        .map_err(|e| ProcessingError::Encode(format!("任务执行失败: {}", e)))??;

        let output = format!("nobg_{}.png", Uuid::new_v4());
        self.write_output(&output, &encoded).await?;
        Ok(output)
    }

    /// 保存生成的图片
    pub async fn save_generated(&self, bytes: &[u8]) -> Result<String, ProcessingError> {
        let output = format!("sd_{}.png", Uuid::new_v4());
        self.write_output(&output, bytes).await?;
        Ok(output)
    }

    /// 保存用户上传的图片，超过默认阈值时自动压缩
    pub async fn save_upload(&self, bytes: &[u8]) -> Result<String, ProcessingError> {
        let output = format!("upload_{}.png", Uuid::new_v4());
        self.write_output(&output, bytes).await?;

        match self
            .compress_if_large(&output, DEFAULT_COMPRESS_THRESHOLD_MB)
            .await
        {
            Ok(filename) => Ok(filename),
            Err(e) => {
                // 无法处理的上传不留在图片目录
                if let Err(remove_err) = fs::remove_file(self.images_dir.join(&output)).await {
                    tracing::warn!("删除上传文件失败: {} - {}", output, remove_err);
                }
                Err(e)
            }
        }
    }

    /// 下载远程图片到图片目录
    pub async fn download_image(&self, url: &str) -> Result<String, ProcessingError> {
        self.downloader.download(url).await
    }
}

fn validate_options(options: &ProcessOptions) -> Result<(), ProcessingError> {
    if let Some(quality) = options.quality {
        if !(1..=100).contains(&quality) {
            return Err(ProcessingError::InvalidOptions(format!(
                "quality 必须在 1-100 之间: {}",
                quality
            )));
        }
    }

    if let Some(ResizeOptions { width, height }) = options.resize {
        if width == Some(0) || height == Some(0) {
            return Err(ProcessingError::InvalidOptions("缩放尺寸必须大于 0".to_string()));
        }
    }

    if let Some(filters) = options.filters {
        if let Some(sigma) = filters.blur {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(ProcessingError::InvalidOptions(format!("无效的模糊半径: {}", sigma)));
            }
        }
        if let Some(degrees) = filters.rotate {
            if degrees % 90 != 0 {
                return Err(ProcessingError::InvalidOptions(format!(
                    "旋转角度必须是 90 的整数倍: {}",
                    degrees
                )));
            }
        }
    }

    Ok(())
}

fn transform(data: &[u8], options: &ProcessOptions) -> Result<Vec<u8>, ProcessingError> {
    let mut img = image::load_from_memory(data)?;

    if let Some(resize) = options.resize {
        img = fit_inside(img, resize);
    }

    if let Some(filters) = options.filters {
        img = apply_filters(img, &filters);
    }

    encode(&img, options.effective_format(), options.effective_quality())
}

/// 等比缩放到框内，不放大
fn fit_inside(img: DynamicImage, resize: ResizeOptions) -> DynamicImage {
    let (width, height) = img.dimensions();
    let box_width = resize.width.unwrap_or(width).min(width);
    let box_height = resize.height.unwrap_or(height).min(height);

    if box_width == width && box_height == height {
        return img;
    }

    img.resize(box_width, box_height, FilterType::Lanczos3)
}

fn apply_filters(mut img: DynamicImage, filters: &ImageFilters) -> DynamicImage {
    if filters.grayscale {
        img = img.grayscale();
    }
    if let Some(sigma) = filters.blur {
        if sigma > 0.0 {
            img = img.blur(sigma);
        }
    }
    if filters.sharpen {
        img = img.unsharpen(1.0, 1);
    }
    if let Some(degrees) = filters.rotate {
        img = match degrees.rem_euclid(360) {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        };
    }
    img
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let mut buffer = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let (width, height) = rgb.dimensions();
            JpegEncoder::new_with_quality(&mut buffer, quality)
                .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
                .map_err(|e| ProcessingError::Encode(e.to_string()))?;
        }
        ImageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
                .map_err(|e| ProcessingError::Encode(e.to_string()))?;
        }
        ImageFormat::Webp => {
            buffer = WebPConverter::encode_lossy(img, quality);
        }
    }

    Ok(buffer)
}

/// 浅色像素 alpha 置 0，其余置 255
fn background_mask(img: &DynamicImage) -> image::RgbaImage {
    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let Rgba([r, g, b, _]) = *pixel;
        let is_background =
            r > BACKGROUND_THRESHOLD && g > BACKGROUND_THRESHOLD && b > BACKGROUND_THRESHOLD;
        *pixel = Rgba([r, g, b, if is_background { 0 } else { 255 }]);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30])))
    }

    #[test]
    fn test_fit_inside_never_upscales() {
        let img = fit_inside(solid(100, 50), ResizeOptions { width: Some(400), height: Some(400) });
        assert_eq!(img.dimensions(), (100, 50));
    }

    #[test]
    fn test_fit_inside_keeps_aspect_ratio() {
        let img = fit_inside(solid(400, 200), ResizeOptions { width: Some(100), height: None });
        assert_eq!(img.dimensions(), (100, 50));
    }

    #[test]
    fn test_rotate_swaps_dimensions() {
        let filters = ImageFilters {
            rotate: Some(-90),
            ..Default::default()
        };
        assert_eq!(apply_filters(solid(40, 20), &filters).dimensions(), (20, 40));
    }

    #[test]
    fn test_validate_rejects_odd_rotation() {
        let options = ProcessOptions {
            filters: Some(ImageFilters {
                rotate: Some(45),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            validate_options(&options),
            Err(ProcessingError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_background_mask_threshold() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgb([255, 255, 255]),
            1 => image::Rgb([241, 241, 241]),
            _ => image::Rgb([240, 255, 255]),
        }));

        let mask = background_mask(&img);
        assert_eq!(mask.get_pixel(0, 0)[3], 0);
        assert_eq!(mask.get_pixel(1, 0)[3], 0);
        // 任一通道不超过阈值即为前景
        assert_eq!(mask.get_pixel(2, 0)[3], 255);
    }

    #[test]
    fn test_encode_formats() {
        let img = solid(8, 8);
        let jpeg = encode(&img, ImageFormat::Jpeg, 90).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);

        let png = encode(&img, ImageFormat::Png, 90).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let webp = encode(&img, ImageFormat::Webp, 90).unwrap();
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let pipeline = ImagePipeline::new(temp_dir.path()).await.unwrap();

        for name in ["../secret.png", "a/b.png", "..", "", "a\\b.png"] {
            assert!(
                matches!(pipeline.resolve(name), Err(ProcessingError::InvalidFilename(_))),
                "{} should be rejected",
                name
            );
        }
        assert!(pipeline.resolve("photo.png").is_ok());
    }
}
