use axum::extract::{Extension, Multipart, Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::common::ApiError;
use crate::domains::access::{authorize, Capability};
use crate::domains::claims::{AvailableMatch, AvailableRecipient, Claim, ClaimUpdate};
use crate::kernel::media::MediaCategory;
use crate::kernel::ServerDeps;
use crate::server::middleware::AuthUser;
use crate::server::routes::{read_text, read_upload, store_uploads, Upload};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_handler).post(create_handler))
        .route("/available-matches", get(available_matches_handler))
        .route("/available-recipient", get(available_recipient_handler))
        .route(
            "/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
}

async fn list_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
) -> Result<Json<Vec<Claim>>, ApiError> {
    authorize(user.role, Capability::ViewDirectory)?;
    let claims = Claim::list_all(&deps.db_pool).await?;
    Ok(Json(claims))
}

async fn get_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<Claim>, ApiError> {
    authorize(user.role, Capability::ProcessClaims)?;
    let claim = Claim::find_by_id(&id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("claim not found".to_string()))?;
    Ok(Json(claim))
}

#[derive(Default)]
struct ClaimForm {
    match_id: Option<String>,
    recipient_id: Option<String>,
    staff_id: Option<String>,
    proof_photo: Option<Upload>,
}

async fn parse_claim_form(mut multipart: Multipart) -> Result<ClaimForm, ApiError> {
    let mut form = ClaimForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("match_id") => form.match_id = Some(read_text(field).await?),
            Some("recipient_id") => form.recipient_id = Some(read_text(field).await?),
            Some("staff_id") => form.staff_id = Some(read_text(field).await?),
            Some("proof_photo") => form.proof_photo = Some(read_upload(field).await?),
            _ => {}
        }
    }
    Ok(form)
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("invalid {}: {}", what, raw)))
}

async fn create_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    // Authorize before touching the media store so a rejected request
    // cannot leave an orphaned proof photo behind.
    authorize(user.role, Capability::ProcessClaims)?;

    let form = parse_claim_form(multipart).await?;

    let (match_id, recipient_raw) = match (form.match_id, form.recipient_id) {
        (Some(m), Some(r)) => (m, r),
        _ => {
            return Err(ApiError::Validation(
                "match_id and recipient_id are required".to_string(),
            ))
        }
    };
    let recipient_id = parse_uuid(&recipient_raw, "recipient_id")?;

    let proof_photo_url = match form.proof_photo {
        Some(upload) => store_uploads(deps.media.as_ref(), vec![upload], MediaCategory::Claim)
            .await?
            .pop(),
        None => None,
    };

    let claim = deps
        .lifecycle
        .create_claim(&user.identity(), &match_id, recipient_id, proof_photo_url)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "claim created, reports closed", "claim": claim })),
    ))
}

async fn update_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(user.role, Capability::ProcessClaims)?;

    let form = parse_claim_form(multipart).await?;
    if form.match_id.is_some() {
        return Err(ApiError::Validation(
            "a claim cannot be moved to a different match".to_string(),
        ));
    }

    let proof_url = match form.proof_photo {
        Some(upload) => store_uploads(deps.media.as_ref(), vec![upload], MediaCategory::Claim)
            .await?
            .pop(),
        None => None,
    };

    let update = ClaimUpdate {
        recipient_id: form
            .recipient_id
            .as_deref()
            .map(|r| parse_uuid(r, "recipient_id"))
            .transpose()?,
        staff_id: form
            .staff_id
            .as_deref()
            .map(|s| parse_uuid(s, "staff_id"))
            .transpose()?,
    };
    let claim = Claim::update(&id, &update, proof_url, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("claim not found".to_string()))?;

    Ok(Json(json!({ "message": "claim updated", "claim": claim })))
}

async fn delete_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    deps.lifecycle.delete_claim(&user.identity(), &id).await?;
    Ok(Json(json!({ "message": "claim deleted" })))
}

/// Unclaimed matches with report summaries, for staff choosing the next
/// hand-off to process.
async fn available_matches_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
) -> Result<Json<Vec<AvailableMatch>>, ApiError> {
    authorize(user.role, Capability::ProcessClaims)?;
    let available = Claim::available_matches(&deps.db_pool).await?;
    Ok(Json(available))
}

#[derive(Deserialize)]
struct RecipientQuery {
    match_id: String,
}

/// Who should receive the item for a given match: the lost report's owner.
async fn available_recipient_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Query(query): Query<RecipientQuery>,
) -> Result<Json<AvailableRecipient>, ApiError> {
    authorize(user.role, Capability::ProcessClaims)?;
    let recipient = Claim::available_recipient(&query.match_id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("match not found".to_string()))?;
    Ok(Json(recipient))
}
