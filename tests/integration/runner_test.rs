//! Integration tests for the worker runner end to end.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;

use joblease_core::config::{LeaseConfig, WorkerConfig};
use joblease_core::types::WorkerId;
use joblease_entity::job::{Job, JobStatus};
use joblease_worker::jobs::{EchoJobHandler, SleepJobHandler};
use joblease_worker::{
    ExecutionReport, JobCreateParams, JobExecutionError, JobExecutor, JobHandler, WorkerRunner,
};

/// Fails every call with a transient error and counts the calls.
#[derive(Debug, Default)]
struct FlakyHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl JobHandler for FlakyHandler {
    fn job_type(&self) -> &str {
        "flaky"
    }

    async fn execute(&self, _job: &Job) -> Result<Option<Value>, JobExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(JobExecutionError::Transient("upstream timed out".to_string()))
    }
}

fn runner(h: &helpers::TestHarness, worker: &str, flaky: Arc<FlakyHandler>) -> Arc<WorkerRunner> {
    let mut executor = JobExecutor::new();
    executor.register(Arc::new(EchoJobHandler));
    executor.register(Arc::new(SleepJobHandler));
    executor.register(flaky);

    Arc::new(WorkerRunner::new(
        Arc::clone(&h.leases),
        Arc::new(executor),
        WorkerConfig::default(),
        LeaseConfig::default(),
        WorkerId::new(worker),
    ))
}

#[tokio::test]
async fn test_transient_failure_is_released_failed() {
    let h = helpers::TestHarness::new();
    let flaky = Arc::new(FlakyHandler::default());
    let worker = runner(&h, "worker-a", Arc::clone(&flaky));
    let id = h.submit("flaky").await;

    let report = worker.run_once().await.unwrap().unwrap();
    assert!(matches!(report, ExecutionReport::Failed { job_id, .. } if job_id == id));

    let job = h.job(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 0);
    assert!(job.error_message.unwrap().contains("upstream timed out"));

    // No re-delivery for handler failures.
    assert_eq!(worker.run_once().await.unwrap(), None);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_crashed_runner_job_is_finished_by_another() {
    let h = helpers::TestHarness::new();
    let id = h
        .submit_with(JobCreateParams {
            payload: serde_json::json!({ "millis": 1_800_000 }),
            ..JobCreateParams::new("sleep")
        })
        .await
        .id;

    let a = runner(&h, "worker-a", Arc::default());
    let crashed = tokio::spawn({
        let a = Arc::clone(&a);
        async move { a.run_once().await }
    });
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    assert_eq!(h.job(id).await.status, JobStatus::Running);

    // Kill worker-a mid-job: no heartbeat, no release.
    crashed.abort();
    let _ = crashed.await;

    h.advance(Duration::minutes(6));
    let report = h.leases.recover_expired_leases().await.unwrap();
    assert_eq!(report.requeued, vec![id]);

    let b = runner(&h, "worker-b", Arc::default());
    let report = b.run_once().await.unwrap();
    assert_eq!(report, Some(ExecutionReport::Completed { job_id: id }));

    let job = h.job(id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.result, Some(serde_json::json!({ "slept_ms": 1_800_000 })));
}

#[tokio::test(start_paused = true)]
async fn test_runners_share_queue_without_duplicates() {
    let h = helpers::TestHarness::new();
    for n in 0..6 {
        h.submit_with(JobCreateParams {
            payload: serde_json::json!({ "n": n }),
            ..JobCreateParams::new("echo")
        })
        .await;
    }

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let handles: Vec<_> = ["worker-a", "worker-b"]
        .into_iter()
        .map(|name| {
            let worker = runner(&h, name, Arc::default());
            let cancel = cancel_rx.clone();
            tokio::spawn(async move { worker.run(cancel).await })
        })
        .collect();

    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    cancel_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = h.queue.stats().await.unwrap();
    assert_eq!(stats.completed, 6);
    assert_eq!(stats.queued + stats.claimed + stats.running + stats.failed, 0);
}
