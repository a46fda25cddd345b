use axum::extract::{Extension, Multipart};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::common::ApiError;
use crate::domains::access::Role;
use crate::domains::users::{NewUser, User};
use crate::kernel::media::MediaCategory;
use crate::kernel::ServerDeps;
use crate::server::middleware::AuthUser;
use crate::server::routes::{read_text, read_upload, store_uploads, Upload};

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/verify", post(verify_handler))
}

#[derive(Default)]
struct RegisterForm {
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
    phone: Option<String>,
    id_document: Option<Upload>,
}

async fn parse_register_form(mut multipart: Multipart) -> Result<RegisterForm, ApiError> {
    let mut form = RegisterForm::default();
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
            Some("id_document") => form.id_document = Some(read_upload(field).await?),
            _ => {}
        }
    }
    Ok(form)
}

/// Self-service registration. New accounts always start as guests; roles are
/// granted later by an admin.
async fn register_handler(
    Extension(deps): Extension<ServerDeps>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let form = parse_register_form(multipart).await?;

    let (email, password, username, phone) = match (
        form.email,
        form.password,
        form.username,
        form.phone,
    ) {
        (Some(e), Some(p), Some(u), Some(n)) => (e, p, u, n),
        _ => {
            return Err(ApiError::Validation(
                "email, password, username and phone are required".to_string(),
            ))
        }
    };

    let user_id = Uuid::new_v4();
    deps.identity
        .create_account(user_id, &email, &password, Role::Guest)
        .await?;

    let id_document_url = match form.id_document {
        Some(upload) => store_uploads(deps.media.as_ref(), vec![upload], MediaCategory::Identity)
            .await?
            .pop(),
        None => None,
    };

    let user = User::insert(
        NewUser {
            id: user_id,
            username,
            email,
            phone: Some(phone),
            role: Role::Guest,
            id_document_url,
        },
        &deps.db_pool,
    )
    .await;

    let user = match user {
        Ok(user) => user,
        Err(e) => {
            // Roll back the account so the email is not left orphaned.
            if let Err(cleanup) = deps.identity.delete_account(user_id).await {
                tracing::warn!(error = %cleanup, user_id = %user_id, "Failed to clean up account after profile insert failure");
            }
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "user registered", "user": user })),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login_handler(
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.email.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation(
            "email and password are required".to_string(),
        ));
    }

    let token = deps.identity.login(&body.email, &body.password).await?;
    let identity = deps.identity.verify_token(&token).await?;
    let user = User::find_by_id(identity.user_id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("user profile not found".to_string()))?;

    Ok(Json(json!({
        "message": "login successful",
        "token": token,
        "user": user,
    })))
}

/// Verify the bearer token and echo the resolved identity claims.
async fn verify_handler(user: AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "message": "token valid",
        "identity": {
            "id": user.user_id,
            "email": user.email,
            "role": user.role,
        },
    }))
}
