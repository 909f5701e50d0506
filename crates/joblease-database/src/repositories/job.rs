//! PostgreSQL job store.
//!
//! Each conditional write is a single `UPDATE … WHERE <predicate>
//! RETURNING`, so the row-level lock Postgres takes for the update is the
//! compare-and-swap. No `SELECT … FOR UPDATE` is held across round trips.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use joblease_core::error::{AppError, ErrorKind};
use joblease_core::result::AppResult;
use joblease_core::types::{JobId, WorkerId};
use joblease_entity::job::{Job, JobOutcome, JobStatus, NewJob};

use crate::store::{JobFilter, JobStore};

/// Claimable: queued, or an expired lease with a delivery attempt to spare.
/// `$now` is the parameter index holding the current time.
macro_rules! claimable_predicate {
    ($now:literal) => {
        concat!(
            "(status = 'queued' OR (status IN ('claimed', 'running') AND lock_expires_at < ",
            $now,
            " AND attempts + 1 < max_attempts))"
        )
    };
}

/// Repository for job records and their lease state.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, message, e)
}

#[async_trait]
impl JobStore for JobRepository {
    async fn insert(&self, data: &NewJob, now: DateTime<Utc>) -> AppResult<Job> {
        let job = Job::from_new(data, now);
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, tenant_scope, job_type, payload, status, priority, \
             lock_version, attempts, max_attempts, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) RETURNING *",
        )
        .bind(job.id)
        .bind(&job.tenant_scope)
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(job.status)
        .bind(job.priority)
        .bind(job.lock_version)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to create job"))
    }

    async fn find_by_id(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find job"))
    }

    async fn list(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs \
             WHERE ($1::job_status IS NULL OR status = $1) \
             AND ($2::text IS NULL OR tenant_scope = $2) \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(filter.status)
        .bind(&filter.tenant_scope)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to list jobs"))
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count jobs"))
    }

    async fn find_claim_candidate(
        &self,
        tenant_scope: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(concat!(
            "SELECT * FROM jobs WHERE ",
            claimable_predicate!("$1"),
            " AND ($2::text IS NULL OR tenant_scope = $2) \
             ORDER BY priority ASC, created_at ASC, id ASC LIMIT 1"
        ))
        .bind(now)
        .bind(tenant_scope)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to select claim candidate"))
    }

    async fn try_claim(
        &self,
        id: JobId,
        expected_version: i64,
        worker: &WorkerId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let claimed = sqlx::query_as::<_, Job>(concat!(
            "UPDATE jobs SET status = 'claimed', claimed_by = $3, claimed_at = $4, \
             lock_expires_at = $5, lock_version = lock_version + 1, \
             attempts = attempts + CASE WHEN status IN ('claimed', 'running') THEN 1 ELSE 0 END, \
             updated_at = $4 \
             WHERE id = $1 AND lock_version = $2 AND ",
            claimable_predicate!("$4"),
            " RETURNING *"
        ))
        .bind(id)
        .bind(expected_version)
        .bind(worker)
        .bind(now)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to claim job"))?;

        if claimed.is_none() {
            debug!(%id, expected_version, %worker, "Claim predicate did not match");
        }
        Ok(claimed)
    }

    async fn extend_lease(
        &self,
        id: JobId,
        worker: &WorkerId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar(
            "UPDATE jobs SET lock_expires_at = GREATEST(lock_expires_at, $3), updated_at = $4 \
             WHERE id = $1 AND claimed_by = $2 AND status IN ('claimed', 'running') \
             RETURNING lock_expires_at",
        )
        .bind(id)
        .bind(worker)
        .bind(expires_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to extend lease"))
    }

    async fn mark_running(
        &self,
        id: JobId,
        worker: &WorkerId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'running', started_at = $3, updated_at = $3 \
             WHERE id = $1 AND claimed_by = $2 AND status = 'claimed'",
        )
        .bind(id)
        .bind(worker)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to mark job running"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(
        &self,
        id: JobId,
        worker: &WorkerId,
        outcome: &JobOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = $3, result = $4, error_message = $5, \
             lock_expires_at = NULL, completed_at = $6, updated_at = $6 \
             WHERE id = $1 AND claimed_by = $2 AND status IN ('claimed', 'running')",
        )
        .bind(id)
        .bind(worker)
        .bind(outcome.final_status())
        .bind(outcome.result())
        .bind(outcome.error_message())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to release job"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_expired_leases(&self, now: DateTime<Utc>) -> AppResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE status IN ('claimed', 'running') AND lock_expires_at < $1 \
             ORDER BY lock_expires_at ASC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to find expired leases"))
    }

    async fn recover_expired(
        &self,
        id: JobId,
        expected_version: i64,
        exhausted_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET attempts = attempts + 1, \
             status = CASE WHEN attempts + 1 >= max_attempts \
                 THEN 'failed'::job_status ELSE 'queued'::job_status END, \
             error_message = CASE WHEN attempts + 1 >= max_attempts \
                 THEN $3 ELSE error_message END, \
             completed_at = CASE WHEN attempts + 1 >= max_attempts THEN $4 ELSE NULL END, \
             claimed_by = NULL, claimed_at = NULL, lock_expires_at = NULL, updated_at = $4 \
             WHERE id = $1 AND lock_version = $2 \
             AND status IN ('claimed', 'running') AND lock_expires_at < $4 \
             RETURNING *",
        )
        .bind(id)
        .bind(expected_version)
        .bind(exhausted_message)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to recover expired lease"))
    }

    async fn delete_terminal_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE status IN ('completed', 'failed') AND updated_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to cleanup jobs"))?;
        Ok(result.rows_affected())
    }
}
