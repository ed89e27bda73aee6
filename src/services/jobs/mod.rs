// 任务模块 - 后台图片生成

pub mod queue;

pub use queue::JobQueue;

use thiserror::Error;

use crate::external::BackendError;
use crate::services::image::ProcessingError;

/// 单个生成任务的失败原因，最终写入任务的 error 字段
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Processing(#[from] ProcessingError),

    #[error("任务执行异常: {0}")]
    Panicked(String),
}

impl GenerationError {
    pub(crate) fn from_join_error(err: tokio::task::JoinError) -> Self {
        if !err.is_panic() {
            return GenerationError::Panicked(err.to_string());
        }

        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        GenerationError::Panicked(message)
    }
}
