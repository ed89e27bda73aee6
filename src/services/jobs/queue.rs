// 图片生成任务队列
//
// - submit 立即返回任务 ID，由唯一的后台 worker 按提交顺序逐个执行
// - 同一时刻最多只有一个任务处于 processing
// - 单个任务失败或 panic 只影响该任务本身
// - 任务只保存在内存中，不会自动清除，由调用方通过 remove 释放

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::GenerationError;
use crate::external::ImageGenerator;
use crate::models::{GenerateImageRequest, GenerationJob, JobEvent, JobStatus};
use crate::services::image::ImagePipeline;

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Registry {
    jobs: HashMap<Uuid, GenerationJob>,
    /// 提交顺序
    order: VecDeque<Uuid>,
}

struct QueueInner {
    registry: RwLock<Registry>,
    generator: Arc<dyn ImageGenerator>,
    pipeline: ImagePipeline,
    notify: Notify,
    draining: AtomicBool,
    events: broadcast::Sender<JobEvent>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

/// 退出时复位 draining 标志
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl JobQueue {
    pub fn new(generator: Arc<dyn ImageGenerator>, pipeline: ImagePipeline) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(QueueInner {
                registry: RwLock::new(Registry::default()),
                generator,
                pipeline,
                notify: Notify::new(),
                draining: AtomicBool::new(false),
                events,
                shutdown: CancellationToken::new(),
                worker: Mutex::new(None),
            }),
        }
    }

    /// 启动后台 worker，重复调用无效
    pub fn start(&self) {
        let mut worker = self.inner.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(async move {
            tracing::info!("Image generation worker started");
            loop {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => break,
                    _ = inner.notify.notified() => inner.drain().await,
                }
            }
            tracing::info!("Image generation worker stopped");
        }));
    }

    /// 提交任务，立即返回任务 ID
    pub async fn submit(&self, request: GenerateImageRequest) -> Uuid {
        let job = GenerationJob::new(request);
        let job_id = job.id;

        {
            let mut registry = self.inner.registry.write().await;
            registry.order.push_back(job_id);
            registry.jobs.insert(job_id, job);
            // 持锁发送，保证 pending 事件先于 worker 的 processing 事件
            self.inner.emit(job_id, JobStatus::Pending);
        }

        tracing::info!("Image generation job submitted: {}", job_id);
        self.inner.notify.notify_one();
        job_id
    }

    pub async fn get_status(&self, job_id: Uuid) -> Option<GenerationJob> {
        self.inner.registry.read().await.jobs.get(&job_id).cloned()
    }

    /// 按提交顺序返回所有任务
    pub async fn list(&self) -> Vec<GenerationJob> {
        let registry = self.inner.registry.read().await;
        registry
            .order
            .iter()
            .filter_map(|id| registry.jobs.get(id).cloned())
            .collect()
    }

    /// 删除任务记录，返回是否存在
    pub async fn remove(&self, job_id: Uuid) -> bool {
        let mut registry = self.inner.registry.write().await;
        let existed = registry.jobs.remove(&job_id).is_some();
        if existed {
            registry.order.retain(|id| *id != job_id);
        }
        existed
    }

    /// 订阅任务状态变更
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// 停止 worker：当前任务执行完后退出，未开始的任务保持 pending
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("图片生成 worker 异常退出: {}", e);
            }
        }
    }
}

impl QueueInner {
    fn emit(&self, job_id: Uuid, status: JobStatus) {
        // 没有订阅者时发送失败，忽略
        let _ = self.events.send(JobEvent { job_id, status });
    }

    /// 依次执行所有 pending 任务
    async fn drain(self: &Arc<Self>) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return; // 已有循环在执行，它会扫描到新提交的任务
        }
        let _guard = DrainGuard(&self.draining);

        while !self.shutdown.is_cancelled() {
            let Some(job_id) = self.next_pending().await else {
                break;
            };
            self.run_job(job_id).await;
        }
    }

    async fn next_pending(&self) -> Option<Uuid> {
        let registry = self.registry.read().await;
        registry.order.iter().copied().find(|id| {
            registry
                .jobs
                .get(id)
                .is_some_and(|job| job.status == JobStatus::Pending)
        })
    }

    async fn run_job(self: &Arc<Self>, job_id: Uuid) {
        let request = {
            let mut registry = self.registry.write().await;
            let Some(job) = registry.jobs.get_mut(&job_id) else {
                return;
            };
            if !job.start() {
                return;
            }
            job.request.clone()
        };
        self.emit(job_id, JobStatus::Processing);
        tracing::info!("Processing image generation job: {}", job_id);

        // 在独立任务中执行，panic 只会让该任务失败
        let inner = Arc::clone(self);
        let outcome = tokio::spawn(async move { inner.execute(&request).await })
            .await
            .unwrap_or_else(|e| Err(GenerationError::from_join_error(e)));

        let status = {
            let mut registry = self.registry.write().await;
            let Some(job) = registry.jobs.get_mut(&job_id) else {
                tracing::warn!("任务在执行期间被删除: {}", job_id);
                return;
            };

            match outcome {
                Ok(filename) => {
                    tracing::info!("Image generation job completed: {} -> {}", job_id, filename);
                    job.complete(filename);
                }
                Err(e) => {
                    tracing::error!("图片生成任务失败: {} - {}", job_id, e);
                    job.fail(e.to_string());
                }
            }
            job.status
        };
        self.emit(job_id, status);
    }

    async fn execute(&self, request: &GenerateImageRequest) -> Result<String, GenerationError> {
        let bytes = self.generator.generate(request).await?;
        let filename = self.pipeline.save_generated(&bytes).await?;
        Ok(filename)
    }
}
