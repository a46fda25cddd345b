//! Row builders for integration tests. These go straight to the database so
//! lifecycle and route tests can set up state without walking the API.

use sqlx::PgPool;
use uuid::Uuid;

use lostfound_core::common::id::report_id;
use lostfound_core::domains::access::Role;
use lostfound_core::domains::categories::Category;
use lostfound_core::domains::reports::{NewReport, Report, ReportKind};
use lostfound_core::domains::users::{NewUser, User};
use lostfound_core::kernel::identity::Identity;

pub async fn create_user(pool: &PgPool, role: Role) -> User {
    let id = Uuid::new_v4();
    User::insert(
        NewUser {
            id,
            username: format!("user-{}", &id.simple().to_string()[..8]),
            email: format!("{}@example.com", id.simple()),
            phone: None,
            role,
            id_document_url: None,
        },
        pool,
    )
    .await
    .expect("failed to insert test user")
}

pub async fn create_category(pool: &PgPool, name: &str) -> Category {
    Category::insert(name, pool)
        .await
        .expect("failed to insert test category")
}

pub async fn create_report(
    pool: &PgPool,
    owner: &User,
    category: &Category,
    kind: ReportKind,
) -> Report {
    Report::insert(
        NewReport {
            id: report_id(),
            category_id: category.id.clone(),
            owner_id: owner.id,
            item_name: format!("{kind} item"),
            location: Some("main lobby".to_string()),
            description: None,
            kind,
            photo_urls: vec![],
        },
        pool,
    )
    .await
    .expect("failed to insert test report")
}

pub fn identity_of(user: &User) -> Identity {
    Identity {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
    }
}

pub async fn report_status(pool: &PgPool, id: &str) -> String {
    let (status,): (String,) = sqlx::query_as("SELECT status::text FROM reports WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("report not found");
    status
}
