//! Integration tests for claiming, heartbeats, and release.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use joblease_core::clock::ManualClock;
use joblease_core::types::{JobId, WorkerId};
use joblease_database::{JobFilter, JobStore};
use joblease_entity::job::{Job, JobOutcome, JobStatus, NewJob};
use joblease_worker::{ClaimRequest, ClaimResult, HeartbeatResult, JobCreateParams, LeaseManager};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_lease_each_job_once() {
    let h = helpers::TestHarness::new();
    for _ in 0..8 {
        h.submit("render").await;
    }

    let tasks: Vec<_> = (0..24)
        .map(|i| {
            let leases = Arc::clone(&h.leases);
            let request = h.request(&format!("worker-{i}"));
            tokio::spawn(async move { leases.claim(&request).await })
        })
        .collect();

    let mut claimed = Vec::new();
    for result in futures::future::join_all(tasks).await {
        if let ClaimResult::Claimed(job) = result.unwrap().unwrap() {
            claimed.push(job);
        }
    }

    let ids: HashSet<JobId> = claimed.iter().map(|j| j.id).collect();
    assert_eq!(ids.len(), claimed.len(), "a job was leased twice");
    assert!(claimed.len() <= 8);

    for job in &claimed {
        let stored = h.job(job.id).await;
        assert_eq!(stored.claimed_by, job.claimed_by);
        assert_eq!(stored.lock_version, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_job_has_single_winner() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let leases = Arc::clone(&h.leases);
            let request = h.request(&format!("worker-{i}"));
            tokio::spawn(async move { leases.claim(&request).await })
        })
        .collect();

    let winners: Vec<Job> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .filter_map(|r| r.unwrap().unwrap().into_job())
        .collect();

    assert_eq!(winners.len(), 1);
    let job = h.job(id).await;
    assert_eq!(job.claimed_by, winners[0].claimed_by);
    assert_eq!(job.status, JobStatus::Claimed);
}

#[tokio::test]
async fn test_live_lease_is_never_reclaimed() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;
    let first = h.claim("worker-a").await.unwrap();

    h.advance(Duration::minutes(helpers::LEASE) - Duration::seconds(1));
    assert!(h.claim("worker-b").await.is_none());

    // A deadline equal to now is not yet expired.
    h.advance(Duration::seconds(1));
    assert_eq!(Some(h.now()), first.lock_expires_at);
    assert!(h.claim("worker-b").await.is_none());

    h.advance(Duration::milliseconds(1));
    let taken = h.claim("worker-b").await.unwrap();
    assert_eq!(taken.id, id);
    assert_eq!(taken.claimed_by, Some(WorkerId::new("worker-b")));
    assert_eq!(taken.attempts, 1);
    assert_eq!(taken.lock_version, 2);
}

#[tokio::test]
async fn test_heartbeat_prevents_takeover() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;
    h.claim("worker-a").await.unwrap();
    let a = WorkerId::new("worker-a");

    for _ in 0..5 {
        h.advance(Duration::minutes(1));
        let beat = h
            .leases
            .heartbeat(id, &a, Duration::minutes(helpers::LEASE))
            .await
            .unwrap();
        assert!(beat.is_extended());
        assert!(h.claim("worker-b").await.is_none());
    }

    let report = h.leases.recover_expired_leases().await.unwrap();
    assert_eq!(report.recovered_count, 0);
    assert_eq!(h.job(id).await.attempts, 0);
}

#[tokio::test]
async fn test_claim_order_priority_then_age() {
    let h = helpers::TestHarness::new();
    let mut low = JobCreateParams::new("render");
    low.priority = 10;
    let low = h.submit_with(low).await.id;
    h.advance(Duration::seconds(1));
    let old_urgent = h.submit("render").await;
    h.advance(Duration::seconds(1));
    let new_urgent = h.submit("render").await;

    let order: Vec<JobId> = [
        h.claim("w").await.unwrap().id,
        h.claim("w").await.unwrap().id,
        h.claim("w").await.unwrap().id,
    ]
    .into();
    assert_eq!(order, vec![old_urgent, new_urgent, low]);
    assert!(h.claim("w").await.is_none());
}

#[tokio::test]
async fn test_terminal_jobs_are_immutable() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;
    h.claim("worker-a").await.unwrap();
    let a = WorkerId::new("worker-a");

    assert!(h.leases.mark_running(id, &a).await.unwrap());
    assert!(
        h.leases
            .release(id, &a, &JobOutcome::completed(None))
            .await
            .unwrap()
    );
    let done = h.job(id).await;

    h.advance(Duration::hours(2));
    assert!(h.claim("worker-b").await.is_none());
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
            .release(id, &a, &JobOutcome::failed("late"))
            .await
            .unwrap()
    );
    assert_eq!(h.leases.recover_expired_leases().await.unwrap().recovered_count, 0);

    assert_eq!(h.job(id).await, done);
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.lock_expires_at.is_none());
}

#[tokio::test]
async fn test_release_failed_records_error() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;
    h.claim("worker-a").await.unwrap();
    let a = WorkerId::new("worker-a");

    // Release straight from Claimed is allowed.
    assert!(
        h.leases
            .release(id, &a, &JobOutcome::failed("disk full"))
            .await
            .unwrap()
    );
    let job = h.job(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("disk full"));
    assert!(job.lock_expires_at.is_none());
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn test_lock_status_reads_do_not_write() {
    let h = helpers::TestHarness::new();
    let id = h.submit("render").await;
    let claimed = h.claim("worker-a").await.unwrap();

    let first = h.leases.get_lock_status(id).await.unwrap();
    let second = h.leases.get_lock_status(id).await.unwrap();
    assert_eq!(first, second);
    assert!(first.locked);
    assert_eq!(first.owner_id, Some(WorkerId::new("worker-a")));
    assert_eq!(first.status, Some(JobStatus::Claimed));
    assert_eq!(h.job(id).await, claimed);

    h.advance(Duration::minutes(10));
    let expired = h.leases.get_lock_status(id).await.unwrap();
    assert!(!expired.locked);
    assert_eq!(expired.owner_id, Some(WorkerId::new("worker-a")));
    assert_eq!(h.job(id).await, claimed);
}

#[tokio::test]
async fn test_listing_by_status() {
    let h = helpers::TestHarness::new();
    h.submit("render").await;
    h.submit("render").await;
    h.claim("worker-a").await.unwrap();

    let queued = h
        .queue
        .list(&JobFilter {
            status: Some(JobStatus::Queued),
            ..JobFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(queued.len(), 1);

    let stats = h.queue.stats().await.unwrap();
    assert_eq!((stats.queued, stats.claimed), (1, 1));
}

#[tokio::test]
async fn test_contention_is_bounded_and_not_an_attempt() {
    let store = Arc::new(helpers::ScriptedStore::default());
    store.lose_every_claim(true);
    let leases = LeaseManager::new(store.clone(), Arc::new(ManualClock::starting_now()));
    let job = store
        .insert(&NewJob::new("render", 3), Utc::now())
        .await
        .unwrap();

    let request = ClaimRequest::new(WorkerId::new("worker-a"), Duration::minutes(5), 2);
    let result = leases.claim(&request).await.unwrap();
    assert_eq!(result, ClaimResult::ContentionExhausted { tries: 3 });

    let untouched = store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, JobStatus::Queued);
    assert_eq!(untouched.attempts, 0);
    assert_eq!(untouched.lock_version, 0);
}
