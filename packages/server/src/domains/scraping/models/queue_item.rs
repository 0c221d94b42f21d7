use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;

use crate::common::{JobSourceId, QueueItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "scrape_queue_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    #[default]
    Pending,
    /// Claimed by a drain; owned until `lease_expires_at`
    Processing,
    Done,
    Failed,
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueItemStatus::Pending => write!(f, "pending"),
            QueueItemStatus::Processing => write!(f, "processing"),
            QueueItemStatus::Done => write!(f, "done"),
            QueueItemStatus::Failed => write!(f, "failed"),
        }
    }
}

/// ScrapeQueueItem - one requested scrape of a source
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeQueueItem {
    pub id: QueueItemId,
    pub source_id: JobSourceId,
    pub status: QueueItemStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl ScrapeQueueItem {
    pub async fn enqueue(
        source_id: JobSourceId,
        max_attempts: i32,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO scrape_queue (id, source_id, max_attempts)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(QueueItemId::new())
        .bind(source_id)
        .bind(max_attempts)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: QueueItemId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM scrape_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_source(source_id: JobSourceId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM scrape_queue WHERE source_id = $1 ORDER BY created_at",
        )
        .bind(source_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Atomically claim up to `limit` items for this drain.
    ///
    /// Pending items and processing items whose lease has lapsed (with
    /// attempts left) are eligible. `SKIP LOCKED` keeps concurrent drains
    /// from ever claiming the same row. Items in `exclude` are skipped so a
    /// drain does not retry what it already handled in the same pass.
    pub async fn claim_batch(
        limit: i64,
        lease: Duration,
        exclude: &[QueueItemId],
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let items = sqlx::query_as::<_, Self>(
            r#"
            WITH claimable AS (
                SELECT id
                FROM scrape_queue
                WHERE
                    (status = 'pending'
                     OR (status = 'processing' AND lease_expires_at < NOW() AND attempts < max_attempts))
                    AND NOT (id = ANY($3))
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE scrape_queue
            SET
                status = 'processing',
                attempts = attempts + 1,
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM claimable)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(lease.as_millis().to_string())
        .bind(exclude)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }

    /// Fail stale claims that have no attempts left. Returns how many were failed.
    pub async fn fail_exhausted_stale(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_queue
            SET status = 'failed',
                last_error = 'lease expired after ' || attempts || ' attempt(s)',
                lease_expires_at = NULL,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE status = 'processing'
              AND lease_expires_at < NOW()
              AND attempts >= max_attempts
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Mark a claimed item done.
    ///
    /// `attempt` is the attempt number the caller claimed with; a caller whose
    /// lease was taken over by a newer claim changes nothing. Returns whether
    /// the item was updated.
    pub async fn mark_done(id: QueueItemId, attempt: i32, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_queue
            SET status = 'done',
                lease_expires_at = NULL,
                last_error = NULL,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND attempts = $2
            "#,
        )
        .bind(id)
        .bind(attempt)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a failed attempt. The item goes back to `pending` while it has
    /// attempts left, otherwise it ends `failed`.
    ///
    /// Returns the new status, or `None` when the caller no longer holds the
    /// claim (see `mark_done`).
    pub async fn mark_failed(
        id: QueueItemId,
        attempt: i32,
        error: &str,
        pool: &PgPool,
    ) -> Result<Option<QueueItemStatus>> {
        sqlx::query_scalar::<_, QueueItemStatus>(
            r#"
            UPDATE scrape_queue
            SET status = CASE WHEN attempts < max_attempts
                              THEN 'pending'::scrape_queue_status
                              ELSE 'failed'::scrape_queue_status END,
                processed_at = CASE WHEN attempts < max_attempts THEN NULL ELSE NOW() END,
                last_error = $3,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND attempts = $2
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(attempt)
        .bind(error)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Push the lease of a claim forward (heartbeat). Returns `false` when
    /// the claim was lost to a newer one.
    pub async fn extend_lease(
        id: QueueItemId,
        attempt: i32,
        lease: Duration,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_queue
            SET lease_expires_at = NOW() + ($3 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND attempts = $2
            "#,
        )
        .bind(id)
        .bind(attempt)
        .bind(lease.as_millis().to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
