//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage back-end selection and the `RmaService` instance
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(router_with(Arc::new(services)))
}

/// Router over already-wired services.
pub fn router_with(services: Arc<AppServices>) -> Router {
    let api = routes::router().layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/info", get(routes::system::info))
        .merge(api)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

pub use services::AppServices;
