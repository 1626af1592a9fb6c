use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension, FromRequest, Multipart, Path, Query, Request},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use rmaledger_core::RmaId;
use rmaledger_returns::{MAX_PHOTO_BYTES, NewRma, PhotoUpload, RmaFilter, RmaPatch};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

/// Files accepted per upload request.
pub const MAX_PHOTOS_PER_REQUEST: usize = 10;

/// Multipart field carrying the JSON body of a create request.
pub const RMA_FORM_FIELD: &str = "rma";

const UPLOAD_BODY_LIMIT: usize = MAX_PHOTOS_PER_REQUEST * MAX_PHOTO_BYTES + 64 * 1024;

pub fn router() -> Router {
    Router::new()
        .route(
            "/",
            post(create_rma)
                .get(list_rmas)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/:id", get(get_rma).patch(update_rma).delete(delete_rma))
        .route("/:id/status", post(update_status))
        .route("/:id/cancel", post(cancel_rma))
        .route("/:id/return-to-stock", post(return_to_stock))
        .route("/:id/history", get(get_history))
        .route(
            "/:id/photos",
            get(get_photos)
                .post(attach_photos)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

fn parse_rma_id(raw: &str) -> Result<RmaId, axum::response::Response> {
    errors::parse_id(raw, "rma")
}

/// Accepts either a JSON `NewRma` or a multipart form with the JSON in an
/// `rma` field plus up to ten image files.
pub async fn create_rma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    request: Request,
) -> axum::response::Response {
    let (input, files) = match read_create_body(request).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.create_rma(input, actor.into_actor_id(), files).await {
        Ok(rma) => (StatusCode::CREATED, Json(rma)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

async fn read_create_body(
    request: Request,
) -> Result<(NewRma, Vec<PhotoUpload>), axum::response::Response> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let Json(input) = Json::<NewRma>::from_request(request, &())
            .await
            .map_err(IntoResponse::into_response)?;
        return Ok((input, Vec::new()));
    }

    let multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let form = read_form(multipart).await?;
    let input = form.rma.ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("missing '{RMA_FORM_FIELD}' field"),
        )
    })?;
    Ok((input, form.files))
}

pub async fn list_rmas(
    Extension(services): Extension<Arc<AppServices>>,
    Query(filter): Query<RmaFilter>,
) -> axum::response::Response {
    match services.rmas.list_rmas(filter).await {
        Ok(rmas) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "count": rmas.len(),
                "items": rmas,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_rma(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.get_rma_details(id).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_rma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(patch): Json<RmaPatch>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.update_fields(id, patch, actor.into_actor_id()).await {
        Ok(rma) => (StatusCode::OK, Json(rma)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_rma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.delete(id, actor.into_actor_id()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStatusRequest>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .rmas
        .update_status(id, body.status, actor.into_actor_id(), body.return_to_stock)
        .await
    {
        Ok(rma) => (StatusCode::OK, Json(rma)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_rma(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.cancel(id, actor.into_actor_id()).await {
        Ok(rma) => (StatusCode::OK, Json(rma)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn return_to_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReturnToStockRequest>>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = body.map(|Json(b)| b).unwrap_or_default();

    match services.rmas.return_to_stock(id, actor.into_actor_id(), body.reason).await {
        Ok(result) => (StatusCode::OK, Json(dto::MovementResponse::from(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.get_history(id).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_photos(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.get_photos(id).await {
        Ok(photos) => (StatusCode::OK, Json(photos)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn attach_photos(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> axum::response::Response {
    let id = match parse_rma_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let files = match read_form(multipart).await {
        Ok(form) => form.files,
        Err(resp) => return resp,
    };

    match services.rmas.attach_photos(id, files, actor.into_actor_id()).await {
        Ok(photos) => (StatusCode::CREATED, Json(photos)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

struct UploadForm {
    rma: Option<NewRma>,
    files: Vec<PhotoUpload>,
}

/// Collect every file part of the form plus the optional `rma` JSON field.
/// Other non-file fields are ignored.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, axum::response::Response> {
    let invalid = |msg: String| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", msg);

    let mut form = UploadForm {
        rma: None,
        files: Vec::new(),
    };
    while let Some(field) = multipart.next_field().await.map_err(|e| invalid(e.body_text()))? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            if field.name() == Some(RMA_FORM_FIELD) {
                let text = field.text().await.map_err(|e| invalid(e.body_text()))?;
                let input = serde_json::from_str(&text)
                    .map_err(|e| invalid(format!("invalid '{RMA_FORM_FIELD}' field: {e}")))?;
                form.rma = Some(input);
            }
            continue;
        };
        if form.files.len() == MAX_PHOTOS_PER_REQUEST {
            return Err(invalid(format!("at most {MAX_PHOTOS_PER_REQUEST} files per request")));
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| invalid(e.body_text()))?;
        form.files.push(PhotoUpload::new(file_name, content_type, bytes.to_vec()));
    }
    Ok(form)
}
