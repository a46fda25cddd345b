use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::id::{claim_id, match_id};
use crate::domains::access::{authorize, Capability, Role};
use crate::domains::claims::Claim;
use crate::domains::lifecycle::LifecycleError;
use crate::domains::matches::Match;
use crate::domains::reports::{Report, ReportKind, ReportStatus};
use crate::kernel::identity::Identity;

/// Report row as seen inside a lifecycle transaction, locked FOR UPDATE.
#[derive(sqlx::FromRow)]
struct LockedReport {
    id: String,
    owner_id: Uuid,
    kind: ReportKind,
    status: ReportStatus,
}

/// Match row locked FOR UPDATE.
#[derive(sqlx::FromRow)]
struct LockedMatch {
    id: String,
    lost_report_id: String,
    found_report_id: String,
}

/// Owns every status transition and every referential guard.
///
/// Handlers never write report statuses or delete linked entities on their
/// own; they call into this service, which validates the request against
/// current state and applies all record mutations in one transaction.
pub struct LifecycleService {
    pool: PgPool,
}

impl LifecycleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn check(&self, role: Role, capability: Capability) -> Result<(), LifecycleError> {
        authorize(role, capability).map_err(|e| LifecycleError::Forbidden(e.to_string()))
    }

    async fn lock_report(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> Result<Option<LockedReport>, sqlx::Error> {
        sqlx::query_as::<_, LockedReport>(
            "SELECT id, owner_id, kind, status FROM reports WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    async fn lock_match(
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> Result<Option<LockedMatch>, sqlx::Error> {
        sqlx::query_as::<_, LockedMatch>(
            "SELECT id, lost_report_id, found_report_id FROM matches WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE reports SET status = $2, updated_at = now() WHERE id = $1")
            .bind(report_id)
            .bind(status)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// True if any match on either report is still unclaimed.
    async fn has_unclaimed_match(
        tx: &mut Transaction<'_, Postgres>,
        report_a: &str,
        report_b: &str,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT m.id FROM matches m
             LEFT JOIN claims c ON c.match_id = m.id
             WHERE c.id IS NULL
               AND (m.lost_report_id = $1 OR m.lost_report_id = $2
                    OR m.found_report_id = $1 OR m.found_report_id = $2)
             LIMIT 1",
        )
        .bind(report_a)
        .bind(report_b)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.is_some())
    }

    /// Pair a lost report with a found report.
    ///
    /// Transition: both reports `open -> matched`. One transaction; both
    /// report rows are locked (ascending id order, so two racing calls
    /// cannot deadlock) before any check, which makes the
    /// no-existing-unclaimed-match check and the insert atomic.
    pub async fn create_match(
        &self,
        actor: &Identity,
        lost_id: &str,
        found_id: &str,
        score: f64,
    ) -> Result<Match, LifecycleError> {
        self.check(actor.role, Capability::ManageMatches)?;

        if lost_id == found_id {
            return Err(LifecycleError::SameReport);
        }

        let mut tx = self.pool.begin().await?;

        let (first_id, second_id) = if lost_id <= found_id {
            (lost_id, found_id)
        } else {
            (found_id, lost_id)
        };
        let first = Self::lock_report(&mut tx, first_id).await?;
        let second = Self::lock_report(&mut tx, second_id).await?;

        let mut lost = None;
        let mut found = None;
        for (wanted_id, row) in [(first_id, first), (second_id, second)] {
            let row = row.ok_or_else(|| LifecycleError::ReportNotFound(wanted_id.to_string()))?;
            if row.id == lost_id {
                lost = Some(row);
            } else {
                found = Some(row);
            }
        }
        let lost = lost.ok_or_else(|| LifecycleError::ReportNotFound(lost_id.to_string()))?;
        let found = found.ok_or_else(|| LifecycleError::ReportNotFound(found_id.to_string()))?;

        if lost.kind != ReportKind::Lost {
            return Err(LifecycleError::InvalidReportKind {
                report_id: lost.id,
                expected: ReportKind::Lost,
            });
        }
        if found.kind != ReportKind::Found {
            return Err(LifecycleError::InvalidReportKind {
                report_id: found.id,
                expected: ReportKind::Found,
            });
        }

        if lost.status != ReportStatus::Open {
            return Err(LifecycleError::AlreadyMatched(lost.id));
        }
        if found.status != ReportStatus::Open {
            return Err(LifecycleError::AlreadyMatched(found.id));
        }

        if Self::has_unclaimed_match(&mut tx, lost_id, found_id).await? {
            return Err(LifecycleError::AlreadyMatched(lost_id.to_string()));
        }

        let created = sqlx::query_as::<_, Match>(
            "INSERT INTO matches (id, lost_report_id, found_report_id, score, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(match_id())
        .bind(lost_id)
        .bind(found_id)
        .bind(score)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::set_status(&mut tx, lost_id, ReportStatus::Matched).await?;
        Self::set_status(&mut tx, found_id, ReportStatus::Matched).await?;

        tx.commit().await?;

        tracing::info!(
            match_id = %created.id,
            lost_report = %lost_id,
            found_report = %found_id,
            by = %actor.user_id,
            "Match created"
        );
        Ok(created)
    }

    /// Revert an unclaimed match: delete it and return both reports to open.
    pub async fn delete_match(
        &self,
        actor: &Identity,
        match_id: &str,
    ) -> Result<(), LifecycleError> {
        self.check(actor.role, Capability::ManageMatches)?;

        let mut tx = self.pool.begin().await?;

        let m = Self::lock_match(&mut tx, match_id)
            .await?
            .ok_or_else(|| LifecycleError::MatchNotFound(match_id.to_string()))?;

        let claimed: Option<(String,)> =
            sqlx::query_as("SELECT id FROM claims WHERE match_id = $1")
                .bind(match_id)
                .fetch_optional(&mut *tx)
                .await?;
        if claimed.is_some() {
            return Err(LifecycleError::MatchAlreadyClaimed(match_id.to_string()));
        }

        let (first, second) = if m.lost_report_id <= m.found_report_id {
            (&m.lost_report_id, &m.found_report_id)
        } else {
            (&m.found_report_id, &m.lost_report_id)
        };
        Self::lock_report(&mut tx, first).await?;
        Self::lock_report(&mut tx, second).await?;

        Self::set_status(&mut tx, &m.lost_report_id, ReportStatus::Open).await?;
        Self::set_status(&mut tx, &m.found_report_id, ReportStatus::Open).await?;

        sqlx::query("DELETE FROM matches WHERE id = $1")
            .bind(match_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(match_id = %match_id, by = %actor.user_id, "Match deleted, reports reopened");
        Ok(())
    }

    /// Record the hand-off of a matched item.
    ///
    /// Transition: both linked reports `matched -> closed`. The claim row's
    /// UNIQUE(match_id) backs up the already-claimed check at the store level.
    pub async fn create_claim(
        &self,
        actor: &Identity,
        match_id_arg: &str,
        recipient_id: Uuid,
        proof_photo_url: Option<String>,
    ) -> Result<Claim, LifecycleError> {
        self.check(actor.role, Capability::ProcessClaims)?;

        let mut tx = self.pool.begin().await?;

        let m = Self::lock_match(&mut tx, match_id_arg)
            .await?
            .ok_or_else(|| LifecycleError::MatchNotFound(match_id_arg.to_string()))?;

        let claimed: Option<(String,)> =
            sqlx::query_as("SELECT id FROM claims WHERE match_id = $1")
                .bind(match_id_arg)
                .fetch_optional(&mut *tx)
                .await?;
        if claimed.is_some() {
            return Err(LifecycleError::AlreadyClaimed(match_id_arg.to_string()));
        }

        let (first, second) = if m.lost_report_id <= m.found_report_id {
            (&m.lost_report_id, &m.found_report_id)
        } else {
            (&m.found_report_id, &m.lost_report_id)
        };
        let first_row = Self::lock_report(&mut tx, first).await?;
        let second_row = Self::lock_report(&mut tx, second).await?;

        for row in [first_row, second_row] {
            let row =
                row.ok_or_else(|| LifecycleError::InconsistentReportState(m.id.clone()))?;
            if row.status != ReportStatus::Matched {
                return Err(LifecycleError::InconsistentReportState(m.id.clone()));
            }
        }

        let recipient: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(recipient_id)
            .fetch_optional(&mut *tx)
            .await?;
        if recipient.is_none() {
            return Err(LifecycleError::RecipientNotFound(recipient_id));
        }

        let created = sqlx::query_as::<_, Claim>(
            "INSERT INTO claims (id, match_id, recipient_id, staff_id, proof_photo_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(claim_id())
        .bind(match_id_arg)
        .bind(recipient_id)
        .bind(actor.user_id)
        .bind(&proof_photo_url)
        .fetch_one(&mut *tx)
        .await?;

        Self::set_status(&mut tx, &m.lost_report_id, ReportStatus::Closed).await?;
        Self::set_status(&mut tx, &m.found_report_id, ReportStatus::Closed).await?;

        tx.commit().await?;

        tracing::info!(
            claim_id = %created.id,
            match_id = %match_id_arg,
            recipient = %recipient_id,
            staff = %actor.user_id,
            "Claim created, reports closed"
        );
        Ok(created)
    }

    /// Delete a claim record. Claims are leaves: nothing references them,
    /// and the linked reports stay closed (closed is terminal).
    pub async fn delete_claim(
        &self,
        actor: &Identity,
        claim_id: &str,
    ) -> Result<(), LifecycleError> {
        self.check(actor.role, Capability::ProcessClaims)?;

        let result = sqlx::query("DELETE FROM claims WHERE id = $1")
            .bind(claim_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LifecycleError::ClaimNotFound(claim_id.to_string()));
        }

        tracing::info!(claim_id = %claim_id, by = %actor.user_id, "Claim deleted");
        Ok(())
    }

    /// Delete a report, provided nothing references it.
    pub async fn delete_report(
        &self,
        actor: &Identity,
        report_id: &str,
    ) -> Result<(), LifecycleError> {
        self.check(actor.role, Capability::ManageReports)?;

        let mut tx = self.pool.begin().await?;

        Self::lock_report(&mut tx, report_id)
            .await?
            .ok_or_else(|| LifecycleError::ReportNotFound(report_id.to_string()))?;

        let referenced: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM matches WHERE lost_report_id = $1 OR found_report_id = $1 LIMIT 1",
        )
        .bind(report_id)
        .fetch_optional(&mut *tx)
        .await?;
        if referenced.is_some() {
            return Err(LifecycleError::HasDependents(format!(
                "report '{}' cannot be deleted: a match references it",
                report_id
            )));
        }

        sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(report_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(report_id = %report_id, by = %actor.user_id, "Report deleted");
        Ok(())
    }

    /// Direct status change requested by a client. Only `open -> closed` is
    /// allowed here (owner withdraws, or staff resolves off-system); matched
    /// reports transition through match/claim operations only.
    pub async fn set_report_status(
        &self,
        actor: &Identity,
        report_id: &str,
        to: ReportStatus,
    ) -> Result<Report, LifecycleError> {
        let mut tx = self.pool.begin().await?;

        let row = Self::lock_report(&mut tx, report_id)
            .await?
            .ok_or_else(|| LifecycleError::ReportNotFound(report_id.to_string()))?;

        let is_owner = row.owner_id == actor.user_id;
        let is_staff = matches!(actor.role, Role::Staff | Role::Admin);
        if !is_owner && !is_staff {
            return Err(LifecycleError::Forbidden(
                "only the report owner or staff may change its status".to_string(),
            ));
        }

        if !row.status.allows_direct_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                from: row.status,
                to,
            });
        }

        Self::set_status(&mut tx, report_id, to).await?;
        tx.commit().await?;

        tracing::info!(report_id = %report_id, status = %to, by = %actor.user_id, "Report status changed");

        let report = Report::find_by_id(report_id, &self.pool)
            .await?
            .ok_or_else(|| LifecycleError::ReportNotFound(report_id.to_string()))?;
        Ok(report)
    }

    /// Delete a user profile, provided they own nothing and are not the
    /// caller. The identity-provider account is removed separately by the
    /// caller; a profile without an account cannot log in, so a partial
    /// failure fails safe.
    pub async fn delete_user(&self, actor: &Identity, user_id: Uuid) -> Result<(), LifecycleError> {
        self.check(actor.role, Capability::ManageUsers)?;

        if actor.user_id == user_id {
            return Err(LifecycleError::SelfDeleteForbidden);
        }

        let mut tx = self.pool.begin().await?;

        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(LifecycleError::UserNotFound(user_id));
        }

        let owns_report: Option<(String,)> =
            sqlx::query_as("SELECT id FROM reports WHERE owner_id = $1 LIMIT 1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owns_report.is_some() {
            return Err(LifecycleError::HasDependents(format!(
                "user '{}' cannot be deleted: they own reports",
                user_id
            )));
        }

        let in_claim: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM claims WHERE recipient_id = $1 OR staff_id = $1 LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if in_claim.is_some() {
            return Err(LifecycleError::HasDependents(format!(
                "user '{}' cannot be deleted: a claim references them",
                user_id
            )));
        }

        let created_match: Option<(String,)> =
            sqlx::query_as("SELECT id FROM matches WHERE created_by = $1 LIMIT 1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if created_match.is_some() {
            return Err(LifecycleError::HasDependents(format!(
                "user '{}' cannot be deleted: a match records them as creator",
                user_id
            )));
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, by = %actor.user_id, "User deleted");
        Ok(())
    }

    /// Delete a category, provided no report references it.
    pub async fn delete_category(
        &self,
        actor: &Identity,
        category_id: &str,
    ) -> Result<(), LifecycleError> {
        self.check(actor.role, Capability::ManageCategories)?;

        let mut tx = self.pool.begin().await?;

        let referenced: Option<(String,)> =
            sqlx::query_as("SELECT id FROM reports WHERE category_id = $1 LIMIT 1")
                .bind(category_id)
                .fetch_optional(&mut *tx)
                .await?;
        if referenced.is_some() {
            return Err(LifecycleError::HasDependents(format!(
                "category '{}' cannot be deleted: reports reference it",
                category_id
            )));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LifecycleError::CategoryNotFound(category_id.to_string()));
        }

        tx.commit().await?;

        tracing::info!(category_id = %category_id, by = %actor.user_id, "Category deleted");
        Ok(())
    }
}
