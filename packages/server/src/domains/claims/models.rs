use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Hand-off record: a matched item released to its recipient.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Claim {
    pub id: String,
    pub match_id: String,
    pub recipient_id: Uuid,
    pub staff_id: Uuid,
    pub proof_photo_url: Option<String>,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Editable claim fields. The match reference is immutable: re-pointing a
/// claim would desync report statuses.
#[derive(Debug, Default, Deserialize)]
pub struct ClaimUpdate {
    pub recipient_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
}

/// An unclaimed match joined with summaries of both reports, for staff
/// picking which hand-off to process next.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct AvailableMatch {
    pub match_id: String,
    pub score: f64,
    pub lost_report_id: String,
    pub lost_item_name: String,
    pub lost_owner_id: Uuid,
    pub found_report_id: String,
    pub found_item_name: String,
    pub found_owner_id: Uuid,
}

/// The rightful recipient for a match: the owner of the lost report.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct AvailableRecipient {
    pub recipient_id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub item_name: String,
    pub lost_report_id: String,
    pub found_report_id: String,
}

impl Claim {
    pub async fn find_by_id(id: &str, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM claims WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM claims ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        id: &str,
        update: &ClaimUpdate,
        new_proof_url: Option<String>,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE claims SET
                 recipient_id = COALESCE($2, recipient_id),
                 staff_id = COALESCE($3, staff_id),
                 proof_photo_url = COALESCE($4, proof_photo_url)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(update.recipient_id)
        .bind(update.staff_id)
        .bind(new_proof_url)
        .fetch_optional(pool)
        .await
    }

    /// Matches with no claim yet, with both report summaries attached.
    pub async fn available_matches(pool: &PgPool) -> Result<Vec<AvailableMatch>, sqlx::Error> {
        sqlx::query_as::<_, AvailableMatch>(
            "SELECT m.id AS match_id,
                    m.score,
                    lost.id AS lost_report_id,
                    lost.item_name AS lost_item_name,
                    lost.owner_id AS lost_owner_id,
                    found.id AS found_report_id,
                    found.item_name AS found_item_name,
                    found.owner_id AS found_owner_id
             FROM matches m
             JOIN reports lost ON lost.id = m.lost_report_id
             JOIN reports found ON found.id = m.found_report_id
             LEFT JOIN claims c ON c.match_id = m.id
             WHERE c.id IS NULL
             ORDER BY m.created_at DESC",
        )
        .fetch_all(pool)
        .await
    }

    /// Resolve who should receive the item for a match: the owner of the
    /// lost report, with contact details.
    pub async fn available_recipient(
        match_id: &str,
        pool: &PgPool,
    ) -> Result<Option<AvailableRecipient>, sqlx::Error> {
        sqlx::query_as::<_, AvailableRecipient>(
            "SELECT u.id AS recipient_id,
                    u.username,
                    u.email,
                    u.phone,
                    lost.item_name,
                    m.lost_report_id,
                    m.found_report_id
             FROM matches m
             JOIN reports lost ON lost.id = m.lost_report_id
             JOIN users u ON u.id = lost.owner_id
             WHERE m.id = $1",
        )
        .bind(match_id)
        .fetch_optional(pool)
        .await
    }
}
