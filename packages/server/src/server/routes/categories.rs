use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::common::ApiError;
use crate::domains::access::{authorize, Capability};
use crate::domains::categories::Category;
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
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = Category::list_all(&deps.db_pool).await?;
    Ok(Json(categories))
}

async fn get_handler(
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let category = Category::find_by_id(&id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("category not found".to_string()))?;
    Ok(Json(category))
}

#[derive(Deserialize)]
struct CategoryRequest {
    name: String,
}

async fn create_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    authorize(user.role, Capability::ManageCategories)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let category = Category::insert(body.name.trim(), &deps.db_pool).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "category created", "category": category })),
    ))
}

async fn update_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(user.role, Capability::ManageCategories)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let category = Category::rename(&id, body.name.trim(), &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("category not found".to_string()))?;

    Ok(Json(json!({ "message": "category updated", "category": category })))
}

async fn delete_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    deps.lifecycle
        .delete_category(&user.identity(), &id)
        .await?;
    Ok(Json(json!({ "message": "category deleted" })))
}
