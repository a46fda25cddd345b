//! Integration tests for the report lifecycle: match and claim transitions,
//! referential guards, and concurrency behavior against a real Postgres.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use lostfound_core::domains::access::Role;
use lostfound_core::domains::lifecycle::{LifecycleError, LifecycleService};
use lostfound_core::domains::matches::Match;
use lostfound_core::domains::reports::{Report, ReportKind, ReportStatus};

use common::*;

#[tokio::test]
async fn test_full_lifecycle_lost_to_claimed() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let finder = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "electronics").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found = create_report(pool, &finder, &category, ReportKind::Found).await;

    let m = service
        .create_match(&identity_of(&staff), &lost.id, &found.id, 0.9)
        .await
        .expect("match creation should succeed");
    assert!(m.id.starts_with("mtc-"));
    assert_eq!(report_status(pool, &lost.id).await, "matched");
    assert_eq!(report_status(pool, &found.id).await, "matched");

    let claim = service
        .create_claim(&identity_of(&staff), &m.id, owner.id, None)
        .await
        .expect("claim creation should succeed");
    assert!(claim.id.starts_with("clm-"));
    assert_eq!(claim.recipient_id, owner.id);
    assert_eq!(claim.staff_id, staff.id);
    assert_eq!(report_status(pool, &lost.id).await, "closed");
    assert_eq!(report_status(pool, &found.id).await, "closed");

    // Second claim on the same match must be rejected.
    let err = service
        .create_claim(&identity_of(&staff), &m.id, owner.id, None)
        .await
        .expect_err("second claim should fail");
    assert!(matches!(err, LifecycleError::AlreadyClaimed(_)));
}

#[tokio::test]
async fn test_create_match_rejects_non_open_report_without_mutation() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "keys").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found_a = create_report(pool, &owner, &category, ReportKind::Found).await;
    let found_b = create_report(pool, &owner, &category, ReportKind::Found).await;

    service
        .create_match(&identity_of(&staff), &lost.id, &found_a.id, 0.8)
        .await
        .expect("first match should succeed");

    // lost is now matched; pairing it again must fail and leave found_b open.
    let err = service
        .create_match(&identity_of(&staff), &lost.id, &found_b.id, 0.5)
        .await
        .expect_err("match on non-open report should fail");
    assert!(matches!(err, LifecycleError::AlreadyMatched(_)));
    assert_eq!(report_status(pool, &found_b.id).await, "open");

    let matches = Match::list_all(pool).await.unwrap();
    assert_eq!(matches.len(), 1);
}

#[tokio::test]
async fn test_delete_match_reopens_reports() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "wallets").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found = create_report(pool, &owner, &category, ReportKind::Found).await;

    let m = service
        .create_match(&identity_of(&staff), &lost.id, &found.id, 1.0)
        .await
        .unwrap();

    service
        .delete_match(&identity_of(&staff), &m.id)
        .await
        .expect("unclaimed match should be deletable");

    assert_eq!(report_status(pool, &lost.id).await, "open");
    assert_eq!(report_status(pool, &found.id).await, "open");
    assert!(Match::find_by_id(&m.id, pool).await.unwrap().is_none());

    // Reopened reports can be matched again.
    service
        .create_match(&identity_of(&staff), &lost.id, &found.id, 0.7)
        .await
        .expect("reopened reports should match again");
}

#[tokio::test]
async fn test_delete_match_rejected_once_claimed() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "bags").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found = create_report(pool, &owner, &category, ReportKind::Found).await;

    let m = service
        .create_match(&identity_of(&staff), &lost.id, &found.id, 0.9)
        .await
        .unwrap();
    service
        .create_claim(&identity_of(&staff), &m.id, owner.id, None)
        .await
        .unwrap();

    let err = service
        .delete_match(&identity_of(&staff), &m.id)
        .await
        .expect_err("claimed match must not be deletable");
    assert!(matches!(err, LifecycleError::MatchAlreadyClaimed(_)));
    assert_eq!(report_status(pool, &lost.id).await, "closed");
}

#[tokio::test]
async fn test_create_match_validates_kinds_and_identity() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "documents").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let other_lost = create_report(pool, &owner, &category, ReportKind::Lost).await;

    let err = service
        .create_match(&identity_of(&staff), &lost.id, &lost.id, 1.0)
        .await
        .expect_err("report cannot be matched to itself");
    assert!(matches!(err, LifecycleError::SameReport));

    // found slot holds a lost report: rejected, nothing mutated.
    let err = service
        .create_match(&identity_of(&staff), &lost.id, &other_lost.id, 1.0)
        .await
        .expect_err("kind mismatch should fail");
    assert!(matches!(
        err,
        LifecycleError::InvalidReportKind {
            expected: ReportKind::Found,
            ..
        }
    ));
    assert_eq!(report_status(pool, &lost.id).await, "open");
    assert_eq!(report_status(pool, &other_lost.id).await, "open");

    let err = service
        .create_match(&identity_of(&staff), "rpt-deadbeef", &lost.id, 1.0)
        .await
        .expect_err("unknown report should fail");
    assert!(matches!(err, LifecycleError::ReportNotFound(_)));
}

#[tokio::test]
async fn test_create_match_requires_staff_role() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let guest = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "misc").await;
    let lost = create_report(pool, &guest, &category, ReportKind::Lost).await;
    let found = create_report(pool, &guest, &category, ReportKind::Found).await;

    let err = service
        .create_match(&identity_of(&guest), &lost.id, &found.id, 0.5)
        .await
        .expect_err("guests cannot create matches");
    assert!(matches!(err, LifecycleError::Forbidden(_)));
    assert_eq!(report_status(pool, &lost.id).await, "open");
}

#[tokio::test]
async fn test_concurrent_match_creation_single_winner() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = Arc::new(LifecycleService::new(pool.clone()));

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "phones").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found_a = create_report(pool, &owner, &category, ReportKind::Found).await;
    let found_b = create_report(pool, &owner, &category, ReportKind::Found).await;

    // Two staff requests race to pair the same lost report.
    let svc_a = service.clone();
    let svc_b = service.clone();
    let actor_a = identity_of(&staff);
    let actor_b = identity_of(&staff);
    let (lost_a, lost_b) = (lost.id.clone(), lost.id.clone());
    let (fa, fb) = (found_a.id.clone(), found_b.id.clone());

    let task_a = tokio::spawn(async move { svc_a.create_match(&actor_a, &lost_a, &fa, 0.9).await });
    let task_b = tokio::spawn(async move { svc_b.create_match(&actor_b, &lost_b, &fb, 0.9).await });

    let result_a = task_a.await.unwrap();
    let result_b = task_b.await.unwrap();

    assert_ne!(
        result_a.is_ok(),
        result_b.is_ok(),
        "exactly one racing match creation must win"
    );
    let matches = Match::list_all(pool).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(report_status(pool, &lost.id).await, "matched");
}

#[tokio::test]
async fn test_create_claim_guards() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "umbrellas").await;

    let err = service
        .create_claim(&identity_of(&staff), "mtc-missing1", owner.id, None)
        .await
        .expect_err("unknown match should fail");
    assert!(matches!(err, LifecycleError::MatchNotFound(_)));

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found = create_report(pool, &owner, &category, ReportKind::Found).await;
    let m = service
        .create_match(&identity_of(&staff), &lost.id, &found.id, 0.8)
        .await
        .unwrap();

    let err = service
        .create_claim(&identity_of(&staff), &m.id, Uuid::new_v4(), None)
        .await
        .expect_err("unknown recipient should fail");
    assert!(matches!(err, LifecycleError::RecipientNotFound(_)));

    // A report slipping out of matched state invalidates the claim.
    sqlx::query("UPDATE reports SET status = 'open' WHERE id = $1")
        .bind(&lost.id)
        .execute(pool)
        .await
        .unwrap();
    let err = service
        .create_claim(&identity_of(&staff), &m.id, owner.id, None)
        .await
        .expect_err("claim on inconsistent reports should fail");
    assert!(matches!(err, LifecycleError::InconsistentReportState(_)));
}

#[tokio::test]
async fn test_delete_claim_keeps_reports_closed() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "jackets").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found = create_report(pool, &owner, &category, ReportKind::Found).await;
    let m = service
        .create_match(&identity_of(&staff), &lost.id, &found.id, 0.8)
        .await
        .unwrap();
    let claim = service
        .create_claim(&identity_of(&staff), &m.id, owner.id, None)
        .await
        .unwrap();

    service
        .delete_claim(&identity_of(&staff), &claim.id)
        .await
        .expect("claim deletion should succeed");
    assert_eq!(report_status(pool, &lost.id).await, "closed");
    assert_eq!(report_status(pool, &found.id).await, "closed");

    let err = service
        .delete_claim(&identity_of(&staff), &claim.id)
        .await
        .expect_err("deleting twice should fail");
    assert!(matches!(err, LifecycleError::ClaimNotFound(_)));
}

#[tokio::test]
async fn test_delete_report_blocked_by_match() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let admin = create_user(pool, Role::Admin).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "glasses").await;

    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found = create_report(pool, &owner, &category, ReportKind::Found).await;
    let m = service
        .create_match(&identity_of(&admin), &lost.id, &found.id, 0.6)
        .await
        .unwrap();

    let err = service
        .delete_report(&identity_of(&admin), &lost.id)
        .await
        .expect_err("matched report must not be deletable");
    assert!(matches!(err, LifecycleError::HasDependents(_)));
    assert!(Report::find_by_id(&lost.id, pool).await.unwrap().is_some());

    // After the match goes away the report can be deleted.
    service.delete_match(&identity_of(&admin), &m.id).await.unwrap();
    service
        .delete_report(&identity_of(&admin), &lost.id)
        .await
        .expect("unreferenced report should be deletable");
    assert!(Report::find_by_id(&lost.id, pool).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_report_status_owner_and_transitions() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let owner = create_user(pool, Role::Guest).await;
    let stranger = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "books").await;
    let report = create_report(pool, &owner, &category, ReportKind::Lost).await;

    let err = service
        .set_report_status(&identity_of(&stranger), &report.id, ReportStatus::Closed)
        .await
        .expect_err("strangers cannot change status");
    assert!(matches!(err, LifecycleError::Forbidden(_)));

    let err = service
        .set_report_status(&identity_of(&owner), &report.id, ReportStatus::Matched)
        .await
        .expect_err("matched is never set directly");
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

    let updated = service
        .set_report_status(&identity_of(&owner), &report.id, ReportStatus::Closed)
        .await
        .expect("owner may withdraw an open report");
    assert_eq!(updated.status, ReportStatus::Closed);

    // closed is terminal
    let err = service
        .set_report_status(&identity_of(&owner), &report.id, ReportStatus::Closed)
        .await
        .expect_err("closed report cannot transition");
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_delete_user_guards() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let admin = create_user(pool, Role::Admin).await;
    let owner = create_user(pool, Role::Guest).await;
    let idle = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "toys").await;
    create_report(pool, &owner, &category, ReportKind::Lost).await;

    let err = service
        .delete_user(&identity_of(&admin), admin.id)
        .await
        .expect_err("self-deletion is forbidden");
    assert!(matches!(err, LifecycleError::SelfDeleteForbidden));

    let err = service
        .delete_user(&identity_of(&admin), owner.id)
        .await
        .expect_err("report owner must not be deletable");
    assert!(matches!(err, LifecycleError::HasDependents(_)));

    service
        .delete_user(&identity_of(&admin), idle.id)
        .await
        .expect("user without records should be deletable");
    assert!(lostfound_core::domains::users::User::find_by_id(idle.id, pool)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_user_blocked_by_created_match() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let admin = create_user(pool, Role::Admin).await;
    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let category = create_category(pool, "scarves").await;
    let lost = create_report(pool, &owner, &category, ReportKind::Lost).await;
    let found = create_report(pool, &owner, &category, ReportKind::Found).await;

    // The staff member owns nothing and appears in no claim, but they are
    // recorded as the match creator.
    let m = service
        .create_match(&identity_of(&staff), &lost.id, &found.id, 0.7)
        .await
        .unwrap();

    let err = service
        .delete_user(&identity_of(&admin), staff.id)
        .await
        .expect_err("match creator must not be deletable");
    assert!(matches!(err, LifecycleError::HasDependents(_)));
    assert!(lostfound_core::domains::users::User::find_by_id(staff.id, pool)
        .await
        .unwrap()
        .is_some());

    // Once the match is gone the staff member can be deleted.
    service.delete_match(&identity_of(&admin), &m.id).await.unwrap();
    service
        .delete_user(&identity_of(&admin), staff.id)
        .await
        .expect("staff without remaining records should be deletable");
}

#[tokio::test]
async fn test_delete_category_guards() {
    let harness = TestHarness::new().await;
    let pool = &harness.db_pool;
    let service = LifecycleService::new(pool.clone());

    let staff = create_user(pool, Role::Staff).await;
    let owner = create_user(pool, Role::Guest).await;
    let used = create_category(pool, "chargers").await;
    let empty = create_category(pool, "unused").await;
    create_report(pool, &owner, &used, ReportKind::Lost).await;

    let err = service
        .delete_category(&identity_of(&staff), &used.id)
        .await
        .expect_err("referenced category must not be deletable");
    assert!(matches!(err, LifecycleError::HasDependents(_)));

    service
        .delete_category(&identity_of(&staff), &empty.id)
        .await
        .expect("unreferenced category should be deletable");

    let err = service
        .delete_category(&identity_of(&staff), &empty.id)
        .await
        .expect_err("deleting twice should fail");
    assert!(matches!(err, LifecycleError::CategoryNotFound(_)));
}
