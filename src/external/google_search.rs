use reqwest::Client;
use serde::Deserialize;

use super::error::{error_message, BackendError};
use crate::models::ImageSearchResult;

/// 单次请求最多返回的结果数（API 限制）
const MAX_RESULTS: u32 = 10;

/// Google 自定义搜索（图片）客户端
#[derive(Clone)]
pub struct GoogleImageSearch {
    client: Client,
    api_key: Option<String>,
    search_engine_id: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    image: Option<SearchItemImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemImage {
    #[serde(default)]
    thumbnail_link: Option<String>,
}

impl From<SearchItem> for ImageSearchResult {
    fn from(item: SearchItem) -> Self {
        let thumbnail = item
            .image
            .and_then(|image| image.thumbnail_link)
            .unwrap_or_else(|| item.link.clone());

        Self {
            url: item.link,
            title: item.title,
            thumbnail,
        }
    }
}

impl GoogleImageSearch {
    pub fn new(
        api_key: Option<String>,
        search_engine_id: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            search_engine_id,
            base_url: base_url.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    /// 凭据缺失时返回配置错误
    pub fn ensure_configured(&self) -> Result<(), BackendError> {
        self.credentials().map(|_| ())
    }

    fn credentials(&self) -> Result<(&str, &str), BackendError> {
        match (self.api_key.as_deref(), self.search_engine_id.as_deref()) {
            (Some(key), Some(cx)) => Ok((key, cx)),
            _ => Err(BackendError::Configuration(
                "未配置 Google 搜索 API（GOOGLE_API_KEY / GOOGLE_SEARCH_ENGINE_ID）".to_string(),
            )),
        }
    }

    /// 搜索图片
    ///
    /// 凭据缺失时直接返回配置错误，不发起网络请求
    pub async fn search(&self, query: &str, count: u32) -> Result<Vec<ImageSearchResult>, BackendError> {
        let (api_key, search_engine_id) = self.credentials()?;
        let num = count.clamp(1, MAX_RESULTS).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", api_key),
                ("cx", search_engine_id),
                ("q", query),
                ("searchType", "image"),
                ("num", num.as_str()),
                ("safe", "active"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Backend(error_message(response).await));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.items.into_iter().map(ImageSearchResult::from).collect())
    }
}
