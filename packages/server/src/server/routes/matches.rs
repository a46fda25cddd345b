use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::common::ApiError;
use crate::domains::access::{authorize, Capability};
use crate::domains::matches::Match;
use crate::kernel::ServerDeps;
use crate::server::middleware::AuthUser;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_handler).post(create_handler))
        .route(
            "/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
}

async fn list_handler(
    Extension(deps): Extension<ServerDeps>,
) -> Result<Json<Vec<Match>>, ApiError> {
    let matches = Match::list_all(&deps.db_pool).await?;
    Ok(Json(matches))
}

async fn get_handler(
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<Match>, ApiError> {
    let found = Match::find_by_id(&id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("match not found".to_string()))?;
    Ok(Json(found))
}

#[derive(Deserialize)]
struct CreateMatchRequest {
    lost_report_id: String,
    found_report_id: String,
    #[serde(default)]
    score: f64,
}

async fn create_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if body.lost_report_id.is_empty() || body.found_report_id.is_empty() {
        return Err(ApiError::Validation(
            "lost_report_id and found_report_id are required".to_string(),
        ));
    }

    let created = deps
        .lifecycle
        .create_match(
            &user.identity(),
            &body.lost_report_id,
            &body.found_report_id,
            body.score,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "match created", "match": created })),
    ))
}

#[derive(Deserialize)]
struct UpdateMatchRequest {
    score: f64,
}

/// Only the similarity score is editable. Re-linking a match to different
/// reports would desync report statuses; delete and recreate instead.
async fn update_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
    Json(body): Json<UpdateMatchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(user.role, Capability::ManageMatches)?;

    let updated = Match::update_score(&id, body.score, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("match not found".to_string()))?;

    Ok(Json(json!({ "message": "match updated", "match": updated })))
}

async fn delete_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    deps.lifecycle.delete_match(&user.identity(), &id).await?;
    Ok(Json(json!({ "message": "match deleted, reports reopened" })))
}
