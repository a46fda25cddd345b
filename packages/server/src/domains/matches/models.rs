use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Staff pairing of one lost report with one found report.
///
/// Creation and deletion run through the lifecycle service: they change
/// report statuses and must be transactional. Only the similarity score is
/// editable in place.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Match {
    pub id: String,
    pub lost_report_id: String,
    pub found_report_id: String,
    pub score: f64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub async fn find_by_id(id: &str, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM matches WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM matches ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn update_score(
        id: &str,
        score: f64,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE matches SET score = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(score)
        .fetch_optional(pool)
        .await
    }
}
