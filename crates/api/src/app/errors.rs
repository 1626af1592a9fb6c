use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use rmaledger_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let code = err.code();
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        ServiceError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, code, msg),
        ServiceError::InsufficientStock {
            available,
            requested,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": code,
                "message": format!("insufficient stock: available {available}, requested {requested}"),
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        ServiceError::AlreadyCancelled => json_error(StatusCode::CONFLICT, code, "rma is already cancelled"),
        ServiceError::InvalidDeleteState { status } => json_error(
            StatusCode::CONFLICT,
            code,
            format!("only cancelled rmas can be deleted (status is '{status}')"),
        ),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, code, msg),
        ServiceError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, "internal storage error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path identifier, answering 400 when it is not a UUID.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr,
{
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
