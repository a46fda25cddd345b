use axum::extract::{Extension, Multipart, Path};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::common::ApiError;
use crate::domains::access::{authorize, Capability, Role};
use crate::domains::users::{NewUser, User, UserUpdate};
use crate::kernel::identity::IdentityError;
use crate::kernel::media::MediaCategory;
use crate::kernel::ServerDeps;
use crate::server::middleware::AuthUser;
use crate::server::routes::{read_text, read_upload, store_uploads, Upload};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_handler).post(create_handler))
        .route("/profile", get(profile_handler).put(update_profile_handler))
        .route(
            "/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/:id/role", patch(set_role_handler))
}

async fn list_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
) -> Result<Json<Vec<User>>, ApiError> {
    authorize(user.role, Capability::ViewDirectory)?;
    let users = User::list_all(&deps.db_pool).await?;
    Ok(Json(users))
}

#[derive(Default)]
struct CreateUserForm {
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
    phone: Option<String>,
    role: Option<String>,
    id_document: Option<Upload>,
}

/// Admin user creation: like registration, but with an explicit role.
async fn create_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    authorize(user.role, Capability::ManageUsers)?;

    let mut form = CreateUserForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("email") => form.email = Some(read_text(field).await?),
            Some("password") => form.password = Some(read_text(field).await?),
            Some("username") => form.username = Some(read_text(field).await?),
            Some("phone") => form.phone = Some(read_text(field).await?),
            Some("role") => form.role = Some(read_text(field).await?),
            Some("id_document") => form.id_document = Some(read_upload(field).await?),
            _ => {}
        }
    }

    let (email, password, username) = match (form.email, form.password, form.username) {
        (Some(e), Some(p), Some(u)) => (e, p, u),
        _ => {
            return Err(ApiError::Validation(
                "email, password and username are required".to_string(),
            ))
        }
    };
    let role: Role = form.role.as_deref().unwrap_or("guest").parse()?;

    let user_id = Uuid::new_v4();
    deps.identity
        .create_account(user_id, &email, &password, role)
        .await?;

    let id_document_url = match form.id_document {
        Some(upload) => store_uploads(deps.media.as_ref(), vec![upload], MediaCategory::Identity)
            .await?
            .pop(),
        None => None,
    };

    let created = User::insert(
        NewUser {
            id: user_id,
            username,
            email,
            phone: form.phone,
            role,
            id_document_url,
        },
        &deps.db_pool,
    )
    .await;

    let created = match created {
        Ok(created) => created,
        Err(e) => {
            if let Err(cleanup) = deps.identity.delete_account(user_id).await {
                tracing::warn!(error = %cleanup, user_id = %user_id, "Failed to clean up account after profile insert failure");
            }
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "user created", "user": created })),
    ))
}

async fn profile_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
) -> Result<Json<User>, ApiError> {
    let profile = User::find_by_id(user.user_id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    Ok(Json(profile))
}

/// Self-service profile edit: display name, phone and identity document.
/// Email and role are not editable here.
async fn update_profile_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut username = None;
    let mut phone = None;
    let mut id_document = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("username") => username = Some(read_text(field).await?),
            Some("phone") => phone = Some(read_text(field).await?),
            Some("id_document") => id_document = Some(read_upload(field).await?),
            _ => {}
        }
    }

    let id_document_url = match id_document {
        Some(upload) => store_uploads(deps.media.as_ref(), vec![upload], MediaCategory::Identity)
            .await?
            .pop(),
        None => None,
    };

    let update = UserUpdate {
        username,
        email: None,
        phone,
    };
    let updated = User::update(user.user_id, &update, id_document_url, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    Ok(Json(json!({ "message": "profile updated", "user": updated })))
}

async fn get_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    authorize(user.role, Capability::ManageUsers)?;
    let found = User::find_by_id(id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    Ok(Json(found))
}

/// Admin edit of another user's profile. An email change propagates to the
/// identity provider first so login and profile cannot diverge silently.
async fn update_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<Uuid>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(user.role, Capability::ManageUsers)?;

    let existing = User::find_by_id(id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    if let Some(email) = &update.email {
        deps.identity.update_email(id, email).await?;
    }

    let updated = match User::update(id, &update, None, &deps.db_pool).await {
        Ok(Some(updated)) => updated,
        Ok(None) => return Err(ApiError::NotFound("user not found".to_string())),
        Err(e) => {
            // Put the provider email back so login and profile stay in sync.
            if update.email.is_some() {
                if let Err(revert) = deps.identity.update_email(id, &existing.email).await {
                    tracing::warn!(error = %revert, user_id = %id, "Failed to revert provider email after profile update failure");
                }
            }
            return Err(match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    ApiError::Conflict("email is already in use".to_string())
                }
                other => other.into(),
            });
        }
    };

    Ok(Json(json!({ "message": "user updated", "user": updated })))
}

#[derive(Deserialize)]
struct SetRoleRequest {
    role: Role,
}

/// Change a user's role. Updates both the profile row and the role claim on
/// the identity provider; tokens issued before the change keep the old role
/// until they expire.
async fn set_role_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<Uuid>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(user.role, Capability::ManageUsers)?;

    deps.identity.set_role(id, body.role).await?;
    let updated = User::set_role(id, body.role, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    Ok(Json(json!({ "message": "role updated", "user": updated })))
}

async fn delete_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    deps.lifecycle.delete_user(&user.identity(), id).await?;

    // The profile is gone; a stale account cannot log into anything, so a
    // missing account here is not an error.
    match deps.identity.delete_account(id).await {
        Ok(()) | Err(IdentityError::AccountNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    Ok(Json(json!({ "message": "user deleted" })))
}
