// 图片 API
//
// 图片生成任务、搜索、下载与后期处理的 HTTP 端点。
// 生成、下载、处理的结果统一返回文件名与 `/api/images/file/{filename}` 地址

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::response::{success, success_with_message};
use super::AppState;
use crate::models::{GenerateImageRequest, ProcessOptions};
use crate::services::image::DEFAULT_COMPRESS_THRESHOLD_MB;

const GOOGLE_MAX_COUNT: u32 = 10;
const SCRAPE_MAX_COUNT: u32 = 20;
const DEFAULT_COUNT: u32 = 10;

/// 保存后的图片文件
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub filename: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,
}

impl StoredImage {
    fn new(filename: String) -> Self {
        let url = format!("/api/images/file/{}", filename);
        Self {
            filename,
            url,
            compressed: None,
        }
    }
}

/// 生成与搜索后端的可用状态
///
/// # 端点
/// GET /api/images/health
pub async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let services = &state.services;
    let stable_diffusion = services.generator.check_availability().await;

    Ok(success(json!({
        "stableDiffusion": stable_diffusion,
        "googleSearch": services.search.google_configured(),
        "browserRunning": services.search.browser_running().await,
    })))
}

/// 提交图片生成任务，立即返回任务 ID
///
/// # 端点
/// POST /api/images/generate
///
/// # 请求体
/// ```json
/// { "prompt": "a red fox", "width": 512, "height": 512, "steps": 20 }
/// ```
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateImageRequest>,
) -> ApiResult<impl IntoResponse> {
    request.validate()?;

    let job_id = state.services.jobs.submit(request).await;
    tracing::info!("图片生成任务已提交: {}", job_id);

    Ok(success(json!({ "jobId": job_id })))
}

fn parse_job_id(job_id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(job_id).map_err(|_| ApiError::NotFound("Job not found".to_string()))
}

/// 查询任务状态
///
/// # 端点
/// GET /api/images/job/{job_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job_id = parse_job_id(&job_id)?;
    let job = state
        .services
        .jobs
        .get_status(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    Ok(success(job))
}

/// 删除任务记录（不会取消正在执行的任务）
///
/// # 端点
/// DELETE /api/images/job/{job_id}
pub async fn remove_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job_id = parse_job_id(&job_id)?;
    if !state.services.jobs.remove(job_id).await {
        return Err(ApiError::NotFound("Job not found".to_string()));
    }

    Ok(success_with_message(json!({ "jobId": job_id }), "Job removed"))
}

/// 按提交顺序列出全部任务
///
/// # 端点
/// GET /api/images/jobs
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.services.jobs.list().await))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub count: Option<u32>,
}

impl SearchQuery {
    /// 校验查询词与数量，返回 (query, count)
    fn validate(&self, max_count: u32) -> ApiResult<(&str, u32)> {
        let query = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ApiError::Validation("Query is required".to_string()))?;

        let count = self.count.unwrap_or(DEFAULT_COUNT);
        if !(1..=max_count).contains(&count) {
            return Err(ApiError::Validation(format!(
                "Invalid count: {} (must be between 1 and {})",
                count, max_count
            )));
        }

        Ok((query, count))
    }
}

/// 通过搜索 API 查找图片
///
/// # 端点
/// GET /api/images/search/google?q=cats&count=5
pub async fn search_google(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let (query, count) = params.validate(GOOGLE_MAX_COUNT)?;
    let results = state.services.search.search_images(query, count).await?;

    Ok(success(json!({ "results": results })))
}

/// 通过浏览器刮削查找图片，两次调用之间有冷却时间
///
/// # 端点
/// GET /api/images/search/scrape?q=cats&count=10
pub async fn search_scrape(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let (query, count) = params.validate(SCRAPE_MAX_COUNT)?;
    let results = state
        .services
        .search
        .scrape_images(query, count as usize)
        .await?;

    Ok(success(json!({ "results": results })))
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

/// 下载远程图片
///
/// # 端点
/// POST /api/images/download
pub async fn download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<impl IntoResponse> {
    if url::Url::parse(&request.url).is_err() {
        return Err(ApiError::Validation("Valid URL is required".to_string()));
    }

    let filename = state.services.pipeline.download_image(&request.url).await?;
    Ok(success(StoredImage::new(filename)))
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub filename: String,
    #[serde(flatten)]
    pub options: ProcessOptions,
}

/// 缩放 / 滤镜 / 转码
///
/// # 端点
/// POST /api/images/process
///
/// # 请求体
/// ```json
/// {
///   "filename": "sd_1.png",
///   "resize": { "width": 800 },
///   "format": "webp",
///   "filters": { "grayscale": true }
/// }
/// ```
pub async fn process(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<impl IntoResponse> {
    let filename = state
        .services
        .pipeline
        .process_image(&request.filename, &request.options)
        .await?;

    Ok(success(StoredImage::new(filename)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressRequest {
    pub filename: String,
    pub max_size_mb: Option<f64>,
}

/// 文件超过阈值时压缩
///
/// # 端点
/// POST /api/images/compress
pub async fn compress(
    State(state): State<AppState>,
    Json(request): Json<CompressRequest>,
) -> ApiResult<impl IntoResponse> {
    let threshold = request.max_size_mb.unwrap_or(DEFAULT_COMPRESS_THRESHOLD_MB);
    if !(1.0..=100.0).contains(&threshold) {
        return Err(ApiError::Validation(format!(
            "Invalid maxSizeMB: {} (must be between 1 and 100)",
            threshold
        )));
    }

    let filename = state
        .services
        .pipeline
        .compress_if_large(&request.filename, threshold)
        .await?;

    let compressed = filename != request.filename;
    Ok(success(StoredImage {
        compressed: Some(compressed),
        ..StoredImage::new(filename)
    }))
}

#[derive(Debug, Deserialize)]
pub struct FilenameRequest {
    pub filename: String,
}

/// 去除浅色背景
///
/// # 端点
/// POST /api/images/remove-background
pub async fn remove_background(
    State(state): State<AppState>,
    Json(request): Json<FilenameRequest>,
) -> ApiResult<impl IntoResponse> {
    let filename = state
        .services
        .pipeline
        .remove_background(&request.filename)
        .await?;

    Ok(success(StoredImage::new(filename)))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// base64 图片数据，可带 `data:image/...;base64,` 前缀
    pub image: Option<String>,
}

/// 上传 base64 图片
///
/// # 端点
/// POST /api/images/upload
pub async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<impl IntoResponse> {
    let image = request
        .image
        .filter(|image| !image.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image data provided".to_string()))?;

    let encoded = match image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:image/") => data,
        _ => image.as_str(),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::BadRequest(format!("无效的 base64 图片数据: {}", e)))?;

    let filename = state.services.pipeline.save_upload(&bytes).await?;
    Ok(success(StoredImage::new(filename)))
}
