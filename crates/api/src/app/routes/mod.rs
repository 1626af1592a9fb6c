use axum::Router;

pub mod inventory;
pub mod photos;
pub mod rmas;
pub mod system;

/// Router for all endpoints that go through the actor middleware.
pub fn router() -> Router {
    Router::new()
        .nest("/rmas", rmas::router())
        .nest("/photos", photos::router())
        .nest("/inventory", inventory::router())
}
