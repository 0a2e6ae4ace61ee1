use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use carpool_lib::message::ChatMessage;

use super::IdPath;
use crate::{auth::AuthUser, error::AppError, server_state::ServerState};

pub fn router() -> Router<Arc<ServerState>> {
    Router::new().route("/{id}", get(get_messages))
}

async fn get_messages(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(trip_id), _): IdPath,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    if !state.data_manager.is_trip_participant(trip_id, caller.id).await? {
        return Err(AppError::Forbidden("You are not part of this trip"));
    }

    Ok(Json(state.data_manager.get_messages(trip_id).await?))
}
