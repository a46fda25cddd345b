use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Whether a report describes a lost item or a found item. Immutable after
/// creation: matches pair a lost report with a found report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "report_kind", rename_all = "lowercase")]
pub enum ReportKind {
    Lost,
    Found,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Lost => "lost",
            ReportKind::Found => "found",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report lifecycle state: `open -> matched -> closed`, with `matched -> open`
/// when a match is reverted. `closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Matched,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Open => "open",
            ReportStatus::Matched => "matched",
            ReportStatus::Closed => "closed",
        }
    }

    /// Transitions a client may request directly via PATCH. Everything else
    /// goes through match/claim operations.
    pub fn allows_direct_transition_to(&self, to: ReportStatus) -> bool {
        matches!((self, to), (ReportStatus::Open, ReportStatus::Closed))
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lost/found report - SQL persistence layer
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Report {
    pub id: String,
    pub category_id: String,
    pub owner_id: Uuid,
    pub item_name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub kind: ReportKind,
    pub photo_urls: Vec<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional filters for listing reports
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub kind: Option<ReportKind>,
    pub status: Option<ReportStatus>,
    pub category_id: Option<String>,
}

/// Fields for inserting a new report
pub struct NewReport {
    pub id: String,
    pub category_id: String,
    pub owner_id: Uuid,
    pub item_name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub kind: ReportKind,
    pub photo_urls: Vec<String>,
}

/// Admin-editable fields; kind and status are never set this way.
#[derive(Debug, Default, Deserialize)]
pub struct ReportUpdate {
    pub category_id: Option<String>,
    pub item_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl Report {
    pub async fn find_by_id(id: &str, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM reports WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(filter: &ReportFilter, pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM reports
             WHERE ($1::report_kind IS NULL OR kind = $1)
               AND ($2::report_status IS NULL OR status = $2)
               AND ($3::text IS NULL OR category_id = $3)
             ORDER BY created_at DESC",
        )
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.category_id.as_deref())
        .fetch_all(pool)
        .await
    }

    pub async fn insert(new: NewReport, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO reports
                 (id, category_id, owner_id, item_name, location, description, kind, photo_urls)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(&new.id)
        .bind(&new.category_id)
        .bind(new.owner_id)
        .bind(&new.item_name)
        .bind(&new.location)
        .bind(&new.description)
        .bind(new.kind)
        .bind(&new.photo_urls)
        .fetch_one(pool)
        .await
    }

    /// Apply an admin update, keeping current values for absent fields.
    /// Replaces photos only when new ones were uploaded.
    pub async fn update_details(
        id: &str,
        update: &ReportUpdate,
        new_photos: Option<Vec<String>>,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE reports SET
                 category_id = COALESCE($2, category_id),
                 item_name = COALESCE($3, item_name),
                 location = COALESCE($4, location),
                 description = COALESCE($5, description),
                 photo_urls = COALESCE($6, photo_urls),
                 updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(update.category_id.as_deref())
        .bind(update.item_name.as_deref())
        .bind(update.location.as_deref())
        .bind(update.description.as_deref())
        .bind(new_photos)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_transitions() {
        assert!(ReportStatus::Open.allows_direct_transition_to(ReportStatus::Closed));
        assert!(!ReportStatus::Open.allows_direct_transition_to(ReportStatus::Matched));
        assert!(!ReportStatus::Matched.allows_direct_transition_to(ReportStatus::Open));
        assert!(!ReportStatus::Matched.allows_direct_transition_to(ReportStatus::Closed));
        assert!(!ReportStatus::Closed.allows_direct_transition_to(ReportStatus::Open));
        assert!(!ReportStatus::Closed.allows_direct_transition_to(ReportStatus::Matched));
    }

    #[test]
    fn test_kind_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&ReportKind::Lost).unwrap(), "\"lost\"");
        let parsed: ReportStatus = serde_json::from_str("\"matched\"").unwrap();
        assert_eq!(parsed, ReportStatus::Matched);
    }
}
