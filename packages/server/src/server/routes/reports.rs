use axum::extract::{Extension, Multipart, Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::common::id::report_id;
use crate::common::ApiError;
use crate::domains::access::{authorize, Capability};
use crate::domains::categories::Category;
use crate::domains::reports::{NewReport, Report, ReportFilter, ReportKind, ReportStatus, ReportUpdate};
use crate::kernel::media::MediaCategory;
use crate::kernel::ServerDeps;
use crate::server::middleware::AuthUser;
use crate::server::routes::{read_text, read_upload, store_uploads, Upload};

/// At most this many photos may be attached to a report.
const MAX_PHOTOS: usize = 3;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_handler).post(create_handler))
        .route(
            "/:id",
            get(get_handler).put(update_handler).delete(delete_handler),
        )
        .route("/:id/status", patch(status_handler))
}

async fn list_handler(
    Extension(deps): Extension<ServerDeps>,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<Report>>, ApiError> {
    let reports = Report::list(&filter, &deps.db_pool).await?;
    Ok(Json(reports))
}

async fn get_handler(
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let report = Report::find_by_id(&id, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("report not found".to_string()))?;
    Ok(Json(report))
}

#[derive(Default)]
struct ReportForm {
    category_id: Option<String>,
    item_name: Option<String>,
    kind: Option<String>,
    location: Option<String>,
    description: Option<String>,
    status: Option<String>,
    photos: Vec<Upload>,
}

async fn parse_report_form(mut multipart: Multipart) -> Result<ReportForm, ApiError> {
    let mut form = ReportForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("category_id") => form.category_id = Some(read_text(field).await?),
            Some("item_name") => form.item_name = Some(read_text(field).await?),
            Some("kind") => form.kind = Some(read_text(field).await?),
            Some("location") => form.location = Some(read_text(field).await?),
            Some("description") => form.description = Some(read_text(field).await?),
            Some("status") => form.status = Some(read_text(field).await?),
            Some("photo") => {
                if form.photos.len() >= MAX_PHOTOS {
                    return Err(ApiError::Validation(format!(
                        "at most {} photos are allowed",
                        MAX_PHOTOS
                    )));
                }
                form.photos.push(read_upload(field).await?);
            }
            _ => {}
        }
    }
    Ok(form)
}

fn parse_kind(raw: &str) -> Result<ReportKind, ApiError> {
    match raw {
        "lost" => Ok(ReportKind::Lost),
        "found" => Ok(ReportKind::Found),
        other => Err(ApiError::Validation(format!(
            "invalid report kind: {}",
            other
        ))),
    }
}

async fn create_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    authorize(user.role, Capability::FileReport)?;

    let form = parse_report_form(multipart).await?;

    let (category_id, item_name, kind_raw) =
        match (form.category_id, form.item_name, form.kind) {
            (Some(c), Some(n), Some(k)) => (c, n, k),
            _ => {
                return Err(ApiError::Validation(
                    "category_id, item_name and kind are required".to_string(),
                ))
            }
        };
    let kind = parse_kind(&kind_raw)?;

    if Category::find_by_id(&category_id, &deps.db_pool)
        .await?
        .is_none()
    {
        return Err(ApiError::Validation(format!(
            "unknown category: {}",
            category_id
        )));
    }

    let photo_urls =
        store_uploads(deps.media.as_ref(), form.photos, MediaCategory::Report).await?;

    let report = Report::insert(
        NewReport {
            id: report_id(),
            category_id,
            owner_id: user.user_id,
            item_name,
            location: form.location,
            description: form.description,
            kind,
            photo_urls,
        },
        &deps.db_pool,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "report created", "report": report })),
    ))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: ReportStatus,
}

/// Direct status change. The lifecycle service enforces which transitions
/// are legal and that the caller owns the report or is staff.
async fn status_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = deps
        .lifecycle
        .set_report_status(&user.identity(), &id, body.status)
        .await?;

    Ok(Json(json!({ "message": "report status updated", "report": report })))
}

/// Admin edit of report details. Kind is immutable and status is managed by
/// the lifecycle service; attempts to set either are rejected outright.
async fn update_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(user.role, Capability::ManageReports)?;

    let form = parse_report_form(multipart).await?;

    if form.kind.is_some() {
        return Err(ApiError::Validation(
            "report kind is immutable after creation".to_string(),
        ));
    }
    if form.status.is_some() {
        return Err(ApiError::Validation(
            "report status cannot be set directly; use the status endpoint".to_string(),
        ));
    }

    if let Some(category_id) = &form.category_id {
        if Category::find_by_id(category_id, &deps.db_pool)
            .await?
            .is_none()
        {
            return Err(ApiError::Validation(format!(
                "unknown category: {}",
                category_id
            )));
        }
    }

    let new_photos = if form.photos.is_empty() {
        None
    } else {
        Some(store_uploads(deps.media.as_ref(), form.photos, MediaCategory::Report).await?)
    };

    let update = ReportUpdate {
        category_id: form.category_id,
        item_name: form.item_name,
        location: form.location,
        description: form.description,
    };
    let report = Report::update_details(&id, &update, new_photos, &deps.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("report not found".to_string()))?;

    Ok(Json(json!({ "message": "report updated", "report": report })))
}

async fn delete_handler(
    user: AuthUser,
    Extension(deps): Extension<ServerDeps>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    deps.lifecycle.delete_report(&user.identity(), &id).await?;
    Ok(Json(json!({ "message": "report deleted" })))
}
