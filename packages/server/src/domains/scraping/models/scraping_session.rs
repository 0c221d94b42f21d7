use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{JobSourceId, QueueItemId, ScrapingSessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "scraping_session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScrapingSessionStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

/// ScrapingSession - one scrape of one source
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingSession {
    pub id: ScrapingSessionId,
    pub source_id: JobSourceId,
    pub queue_item_id: Option<QueueItemId>,
    pub status: ScrapingSessionStatus,
    pub pages_fetched: i32,
    pub jobs_found: i32,
    pub jobs_saved: i32,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Running totals for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTally {
    pub pages_fetched: i32,
    pub jobs_found: i32,
    pub jobs_saved: i32,
}

impl ScrapingSession {
    pub async fn start(
        source_id: JobSourceId,
        queue_item_id: Option<QueueItemId>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO scraping_sessions (id, source_id, queue_item_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(ScrapingSessionId::new())
        .bind(source_id)
        .bind(queue_item_id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn complete(id: ScrapingSessionId, tally: SessionTally, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE scraping_sessions
            SET status = 'completed',
                pages_fetched = $2,
                jobs_found = $3,
                jobs_saved = $4,
                finished_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tally.pages_fetched)
        .bind(tally.jobs_found)
        .bind(tally.jobs_saved)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn fail(
        id: ScrapingSessionId,
        tally: SessionTally,
        error: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE scraping_sessions
            SET status = 'failed',
                pages_fetched = $2,
                jobs_found = $3,
                jobs_saved = $4,
                error = $5,
                finished_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tally.pages_fetched)
        .bind(tally.jobs_found)
        .bind(tally.jobs_saved)
        .bind(error)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_source(source_id: JobSourceId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM scraping_sessions WHERE source_id = $1 ORDER BY started_at DESC",
        )
        .bind(source_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
