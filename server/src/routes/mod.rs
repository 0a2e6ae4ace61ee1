use std::sync::Arc;

use axum::{extract::Path, routing::get, Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};

use crate::{chat_endpoint::chat_handler, error::AppError, server_state::ServerState};

mod auth;
mod football_data;
mod messages;
mod trip_passengers;
mod trips;
mod users;

type JsonBody<T> = WithRejection<Json<T>, AppError>;
type IdPath = WithRejection<Path<i64>, AppError>;

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/trips", trips::router())
        .nest("/trip-passengers", trip_passengers::router())
        .nest("/messages", messages::router())
        .nest("/api", football_data::router())
        .route("/chat", get(chat_handler))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}
