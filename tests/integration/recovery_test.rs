//! Integration tests for the lease recovery sweep.

mod helpers;

use std::sync::Arc;

use chrono::Duration;

use joblease_core::types::WorkerId;
use joblease_entity::job::{JobOutcome, JobStatus};
use joblease_worker::{HeartbeatResult, JobCreateParams};

#[tokio::test]
async fn test_crashed_worker_job_is_requeued() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;
    h.claim("worker-a").await.unwrap();

    // worker-a dies without heartbeating.
    h.advance(Duration::minutes(6));
    let report = h.leases.recover_expired_leases().await.unwrap();
    assert_eq!(report.recovered_count, 1);
    assert_eq!(report.job_ids, vec![id]);
    assert_eq!(report.requeued, vec![id]);
    assert!(report.exhausted.is_empty());

    let job = h.job(id).await;
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert!(job.claimed_by.is_none());
    assert!(job.claimed_at.is_none());
    assert!(job.lock_expires_at.is_none());

    let again = h.claim("worker-b").await.unwrap();
    assert_eq!(again.id, id);
    assert_eq!(again.attempts, 1);
}

#[tokio::test]
async fn test_sweep_with_nothing_expired_is_empty() {
    let h = helpers::TestHarness::new();
    h.submit("render").await;
    h.claim("worker-a").await.unwrap();

    h.advance(Duration::minutes(4));
    let report = h.leases.recover_expired_leases().await.unwrap();
    assert_eq!(report.recovered_count, 0);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn test_exhausted_job_fails_permanently() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;

    for round in 1..=3 {
        let job = h.claim(&format!("worker-{round}")).await.unwrap();
        assert_eq!(job.id, id);
        h.advance(Duration::minutes(6));
        let report = h.leases.recover_expired_leases().await.unwrap();
        assert_eq!(report.recovered_count, 1);
        assert_eq!(h.job(id).await.attempts, round);
    }

    let job = h.job(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, job.max_attempts);
    assert!(job.completed_at.is_some());
    assert!(job.lock_expires_at.is_none());
    assert!(job.claimed_by.is_none());
    assert!(job.error_message.unwrap().contains("exhausted"));

    h.advance(Duration::hours(1));
    assert!(h.claim("worker-x").await.is_none());
    assert_eq!(
        h.leases.recover_expired_leases().await.unwrap().recovered_count,
        0
    );
}

#[tokio::test]
async fn test_last_attempt_is_left_to_recovery() {
    let h = helpers::TestHarness::new();
    let mut params = JobCreateParams::new("render");
    params.max_attempts = Some(2);
    let id = h.submit_with(params).await.id;

    h.claim("worker-a").await.unwrap();
    h.advance(Duration::minutes(6));

    // A takeover would be the job's second and final delivery.
    let taken = h.claim("worker-b").await.unwrap();
    assert_eq!(taken.attempts, 1);

    h.advance(Duration::minutes(6));
    assert!(h.claim("worker-c").await.is_none());

    let report = h.leases.recover_expired_leases().await.unwrap();
    assert_eq!(report.exhausted, vec![id]);
    let job = h.job(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 2);
}

#[tokio::test]
async fn test_stale_holder_is_fenced_after_reassignment() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;
    let a = WorkerId::new("worker-a");
    let b = WorkerId::new("worker-b");

    h.claim("worker-a").await.unwrap();
    assert!(h.leases.mark_running(id, &a).await.unwrap());

    // worker-a stalls past its lease; the job moves to worker-b.
    h.advance(Duration::minutes(6));
    h.leases.recover_expired_leases().await.unwrap();
    let reassigned = h.claim("worker-b").await.unwrap();
    let b_deadline = reassigned.lock_expires_at;

    h.advance(Duration::seconds(30));
    assert_eq!(
        h.leases
            .heartbeat(id, &a, Duration::minutes(5))
            .await
            .unwrap(),
        HeartbeatResult::OwnershipLost
    );
    assert!(!h.leases.mark_running(id, &a).await.unwrap());
    assert!(
        !h.leases
            .release(id, &a, &JobOutcome::completed(None))
            .await
            .unwrap()
    );

    let job = h.job(id).await;
    assert_eq!(job.claimed_by, Some(b.clone()));
    assert_eq!(job.lock_expires_at, b_deadline);
    assert_eq!(job.status, JobStatus::Claimed);

    assert!(h.leases.mark_running(id, &b).await.unwrap());
    assert!(
        h.leases
            .release(id, &b, &JobOutcome::completed(None))
            .await
            .unwrap()
    );
    assert_eq!(h.job(id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_one_failed_recovery_does_not_stop_the_sweep() {
    let store = Arc::new(helpers::ScriptedStore::default());
    let h = helpers::TestHarness::over(store.clone());

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(h.submit("render").await);
        h.claim(&format!("worker-{i}")).await.unwrap();
    }
    store.break_recovery_of(ids[1]);

    h.advance(Duration::minutes(6));
    let report = h.leases.recover_expired_leases().await.unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(report.recovered_count, 2);
    assert!(report.job_ids.contains(&ids[0]));
    assert!(report.job_ids.contains(&ids[2]));

    assert_eq!(h.job(ids[0]).await.status, JobStatus::Queued);
    assert_eq!(h.job(ids[1]).await.status, JobStatus::Claimed);
    assert_eq!(h.job(ids[2]).await.status, JobStatus::Queued);
}

#[tokio::test]
async fn test_cleanup_removes_only_old_terminal_jobs() {
    let h = helpers::TestHarness::new();
    let old = h.submit("render").await;
    h.claim("worker-a").await.unwrap();
    h.leases
        .release(old, &WorkerId::new("worker-a"), &JobOutcome::completed(None))
        .await
        .unwrap();

    h.advance(Duration::days(31));
    let pending = h.submit("render").await;

    assert_eq!(h.queue.cleanup_terminal(30).await.unwrap(), 1);
    assert!(h.store.find_by_id(old).await.unwrap().is_none());
    assert_eq!(h.job(pending).await.status, JobStatus::Queued);
}
