use thiserror::Error;
use uuid::Uuid;

use crate::common::ApiError;
use crate::domains::reports::{ReportKind, ReportStatus};

/// Violations of the report/match/claim state machine and its referential
/// invariants.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("report '{0}' not found")]
    ReportNotFound(String),

    #[error("report '{report_id}' is not a {expected} report")]
    InvalidReportKind {
        report_id: String,
        expected: ReportKind,
    },

    #[error("cannot match a report against itself")]
    SameReport,

    #[error("report '{0}' already has an active match")]
    AlreadyMatched(String),

    #[error("match '{0}' not found")]
    MatchNotFound(String),

    #[error("match '{0}' has already been claimed")]
    MatchAlreadyClaimed(String),

    #[error("match '{0}' already has a claim")]
    AlreadyClaimed(String),

    #[error("reports linked by match '{0}' are not in matched status")]
    InconsistentReportState(String),

    #[error("claim '{0}' not found")]
    ClaimNotFound(String),

    #[error("user '{0}' not found")]
    UserNotFound(Uuid),

    #[error("recipient '{0}' not found")]
    RecipientNotFound(Uuid),

    #[error("category '{0}' not found")]
    CategoryNotFound(String),

    #[error("{0}")]
    HasDependents(String),

    #[error("cannot delete your own account")]
    SelfDeleteForbidden,

    #[error("status cannot change from {from} to {to} directly")]
    InvalidTransition {
        from: ReportStatus,
        to: ReportStatus,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::ReportNotFound(_)
            | LifecycleError::MatchNotFound(_)
            | LifecycleError::ClaimNotFound(_)
            | LifecycleError::UserNotFound(_)
            | LifecycleError::RecipientNotFound(_)
            | LifecycleError::CategoryNotFound(_) => ApiError::NotFound(e.to_string()),

            LifecycleError::InvalidReportKind { .. } | LifecycleError::SameReport => {
                ApiError::Validation(e.to_string())
            }

            LifecycleError::AlreadyMatched(_)
            | LifecycleError::MatchAlreadyClaimed(_)
            | LifecycleError::AlreadyClaimed(_)
            | LifecycleError::InconsistentReportState(_)
            | LifecycleError::HasDependents(_)
            | LifecycleError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),

            LifecycleError::SelfDeleteForbidden | LifecycleError::Forbidden(_) => {
                ApiError::Authorization(e.to_string())
            }

            LifecycleError::Store(inner) => inner.into(),
        }
    }
}
