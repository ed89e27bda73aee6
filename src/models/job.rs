use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 图片生成请求参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// 生成请求验证错误
#[derive(Error, Debug, PartialEq)]
pub enum RequestValidationError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error("Invalid {field}: {value} (must be between {min} and {max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl GenerateImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestValidationError::EmptyPrompt);
        }

        check_range("width", self.width.map(f64::from), 64.0, 2048.0)?;
        check_range("height", self.height.map(f64::from), 64.0, 2048.0)?;
        check_range("steps", self.steps.map(f64::from), 1.0, 150.0)?;
        check_range("cfgScale", self.cfg_scale.map(f64::from), 1.0, 30.0)?;

        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<(), RequestValidationError> {
    match value {
        Some(v) if v < min || v > max => Err(RequestValidationError::OutOfRange {
            field,
            value: v,
            min,
            max,
        }),
        _ => Ok(()),
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 状态只能单调前进：pending -> processing -> completed | failed
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// 图片生成任务
///
/// 仅保存在内存中，进程退出即丢失
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub prompt: String,
    #[serde(skip)]
    pub request: GenerateImageRequest,
    /// 生成图片的文件名，仅 completed 时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// 失败原因，仅 failed 时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(request: GenerateImageRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            prompt: request.prompt.clone(),
            request,
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                "忽略非法的任务状态变更: job={}, {:?} -> {:?}",
                self.id,
                self.status,
                next
            );
            return false;
        }
        self.status = next;
        true
    }

    pub fn start(&mut self) -> bool {
        self.transition(JobStatus::Processing)
    }

    pub fn complete(&mut self, result: String) -> bool {
        if self.transition(JobStatus::Completed) {
            self.result = Some(result);
            true
        } else {
            false
        }
    }

    pub fn fail(&mut self, error: String) -> bool {
        if self.transition(JobStatus::Failed) {
            self.error = Some(error);
            true
        } else {
            false
        }
    }
}

/// 任务状态变更事件
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request() {
        assert!(GenerateImageRequest::new("a cat").validate().is_ok());
        assert_eq!(
            GenerateImageRequest::new("  ").validate(),
            Err(RequestValidationError::EmptyPrompt)
        );

        let mut request = GenerateImageRequest::new("a cat");
        request.width = Some(4096);
        assert!(matches!(
            request.validate(),
            Err(RequestValidationError::OutOfRange { field: "width", .. })
        ));
    }

    #[test]
    fn test_status_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_terminal_state_never_reentered() {
        let mut job = GenerationJob::new(GenerateImageRequest::new("a cat"));
        assert!(job.start());
        assert!(job.complete("sd_1.png".to_string()));
        assert!(!job.fail("late error".to_string()));
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_status_surface_json() {
        let job = GenerationJob::new(GenerateImageRequest::new("a cat"));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["prompt"], "a cat");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("result").is_none());
        assert!(json.get("request").is_none());
    }
}
