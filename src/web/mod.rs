pub mod auth;
pub mod error;
pub mod invites;
pub mod responses;
pub mod session;
pub mod surveys;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/api", invites::router(state.clone()))
        .nest(
            "/dashboard",
            surveys::router(state.clone()).merge(responses::router(state)),
        )
}
