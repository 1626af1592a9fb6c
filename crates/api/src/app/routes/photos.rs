use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::delete,
    Router,
};

use rmaledger_core::PhotoId;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().route("/:id", delete(remove_photo))
}

pub async fn remove_photo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PhotoId = match errors::parse_id(&id, "photo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.rmas.remove_photo(id, actor.into_actor_id()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
