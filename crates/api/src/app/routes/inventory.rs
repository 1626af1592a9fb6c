use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use rmaledger_core::{LocationId, ProductId};
use rmaledger_inventory::{MovementRequest, StockKey};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/movements", post(move_stock))
        .route("/:product_id/:location_id", get(get_stock))
        .route("/:product_id/:location_id/movements", get(list_movements))
        .route("/:product_id/:location_id/reconcile", get(reconcile))
}

fn parse_key(product_id: &str, location_id: &str) -> Result<(ProductId, LocationId), axum::response::Response> {
    Ok((
        errors::parse_id(product_id, "product")?,
        errors::parse_id(location_id, "location")?,
    ))
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, location_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (product_id, location_id) = match parse_key(&product_id, &location_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.stock(product_id, location_id).await {
        Ok(record) => (StatusCode::OK, Json(dto::StockResponse::from(record))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, location_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (product_id, location_id) = match parse_key(&product_id, &location_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.movements(product_id, location_id).await {
        Ok(movements) => (StatusCode::OK, Json(movements)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Path((product_id, location_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (product_id, location_id) = match parse_key(&product_id, &location_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.reconcile(product_id, location_id).await {
        Ok(check) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "recorded": check.recorded,
                "replayed": check.replayed,
                "consistent": check.is_consistent(),
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn move_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::ManualMovementRequest>,
) -> axum::response::Response {
    let mut request = MovementRequest::new(
        StockKey::new(body.product_id, body.location_id),
        body.quantity,
        body.direction,
        actor.into_actor_id(),
        body.reason,
    );
    if let Some(reference) = body.reference {
        request = request.with_reference(reference);
    }

    match services.rmas.move_stock(request).await {
        Ok(result) => (StatusCode::CREATED, Json(dto::MovementResponse::from(result))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
