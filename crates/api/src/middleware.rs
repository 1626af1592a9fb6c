use axum::{
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};

use rmaledger_core::ActorId;

use crate::app::errors::json_error;
use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Attach the caller's `ActorContext`. Mutating requests must carry one.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    match extract_actor(req.headers())? {
        Some(actor) => {
            req.extensions_mut().insert(ActorContext::new(actor));
        }
        None if is_mutating(req.method()) => {
            return Err(json_error(
                StatusCode::UNAUTHORIZED,
                "missing_actor",
                "X-Actor-Id header is required",
            ));
        }
        None => {}
    }

    Ok(next.run(req).await)
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn extract_actor(headers: &HeaderMap) -> Result<Option<ActorId>, Response> {
    let Some(header) = headers.get(ACTOR_HEADER) else {
        return Ok(None);
    };

    let raw = header
        .to_str()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_actor", "X-Actor-Id is not valid text"))?;

    ActorId::parse(raw)
        .map(Some)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_actor", e.to_string()))
}
