use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::server_state::ServerState;

pub mod auth;
pub mod chat_endpoint;
pub mod chat_rooms;
pub mod config;
pub mod error;
pub mod routes;
pub mod server_state;

pub fn app(state: Arc<ServerState>) -> Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
