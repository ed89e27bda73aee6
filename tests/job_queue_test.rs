// 图片生成任务队列集成测试
//
// 验证任务状态序列、提交顺序执行以及同一时刻只有一个任务在执行

#[cfg(test)]
mod job_queue_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use presentation_backend::external::{BackendError, ImageGenerator};
    use presentation_backend::models::{GenerateImageRequest, JobStatus};
    use presentation_backend::services::{ImagePipeline, JobQueue};
    use tempfile::TempDir;
    use uuid::Uuid;

    /// 记录并发度的慢速生成器，prompt 以 "fail" 开头时返回错误
    #[derive(Default)]
    struct SlowGenerator {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageGenerator for SlowGenerator {
        async fn check_availability(&self) -> bool {
            true
        }

        async fn generate(&self, request: &GenerateImageRequest) -> Result<Vec<u8>, BackendError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if request.prompt.starts_with("fail") {
                Err(BackendError::Backend("CUDA out of memory".to_string()))
            } else {
                Ok(vec![0x89, b'P', b'N', b'G'])
            }
        }
    }

    async fn setup(generator: Arc<SlowGenerator>) -> (TempDir, JobQueue) {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = ImagePipeline::new(temp_dir.path()).await.unwrap();
        let queue = JobQueue::new(generator, pipeline);
        (temp_dir, queue)
    }

    async fn wait_all_terminal(queue: &JobQueue, ids: &[Uuid]) {
        for _ in 0..500 {
            let mut done = true;
            for id in ids {
                let status = queue.get_status(*id).await.map(|job| job.status);
                if !status.is_some_and(|s| s.is_terminal()) {
                    done = false;
                    break;
                }
            }
            if done {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("jobs did not finish in time");
    }

    #[tokio::test]
    async fn test_jobs_run_sequentially_with_ordered_events() {
        let generator = Arc::new(SlowGenerator::default());
        let (_dir, queue) = setup(Arc::clone(&generator)).await;
        let mut events = queue.subscribe();
        queue.start();

        let prompts = ["one", "fail-two", "three", "four", "fail-five"];
        let mut ids = Vec::new();
        for prompt in prompts {
            ids.push(queue.submit(GenerateImageRequest::new(prompt)).await);
        }

        wait_all_terminal(&queue, &ids).await;

        // 同一时刻只有一个任务在执行
        assert_eq!(generator.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(generator.calls.load(Ordering::SeqCst), prompts.len());

        // 每个任务的状态序列
        let mut sequences: HashMap<Uuid, Vec<JobStatus>> = HashMap::new();
        let mut processing_order = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.status == JobStatus::Processing {
                processing_order.push(event.job_id);
            }
            sequences.entry(event.job_id).or_default().push(event.status);
        }

        assert_eq!(processing_order, ids, "jobs must start in submission order");

        for (id, prompt) in ids.iter().zip(prompts) {
            let expected_terminal = if prompt.starts_with("fail") {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            };
            assert_eq!(
                sequences[id],
                vec![JobStatus::Pending, JobStatus::Processing, expected_terminal]
            );

            let job = queue.get_status(*id).await.unwrap();
            assert_eq!(job.status, expected_terminal);
            match expected_terminal {
                JobStatus::Completed => {
                    assert!(job.result.is_some());
                    assert!(job.error.is_none());
                }
                _ => {
                    assert!(job.result.is_none());
                    assert!(job.error.unwrap().contains("CUDA out of memory"));
                }
            }
        }

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_processing_events_never_overlap() {
        let generator = Arc::new(SlowGenerator::default());
        let (_dir, queue) = setup(generator).await;
        let mut events = queue.subscribe();
        queue.start();

        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(queue.submit(GenerateImageRequest::new(format!("job {}", i))).await);
        }
        wait_all_terminal(&queue, &ids).await;

        // processing 之后必须先出现同一任务的终态，才会有下一个 processing
        let mut active: Option<Uuid> = None;
        while let Ok(event) = events.try_recv() {
            match event.status {
                JobStatus::Processing => {
                    assert!(active.is_none(), "two jobs processing at once");
                    active = Some(event.job_id);
                }
                JobStatus::Completed | JobStatus::Failed => {
                    assert_eq!(active, Some(event.job_id));
                    active = None;
                }
                JobStatus::Pending => {}
            }
        }
        assert!(active.is_none());

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_returns_immediately() {
        let generator = Arc::new(SlowGenerator::default());
        let (_dir, queue) = setup(generator).await;
        queue.start();

        let job_id = queue.submit(GenerateImageRequest::new("fast")).await;

        // 生成耗时 20ms，submit 返回时任务不可能已经结束
        let status = queue.get_status(job_id).await.unwrap().status;
        assert!(!status.is_terminal());

        wait_all_terminal(&queue, &[job_id]).await;
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_job_is_absent() {
        let generator = Arc::new(SlowGenerator::default());
        let (_dir, queue) = setup(generator).await;

        assert!(queue.get_status(Uuid::new_v4()).await.is_none());
    }
}
