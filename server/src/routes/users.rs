use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use carpool_lib::user::{User, UserUpdate};
use serde::Deserialize;
use serde_json::Value;

use super::{message, IdPath, JsonBody};
use crate::{
    auth::{check_password, hash_password, looks_like_email, AuthUser},
    error::AppError,
    server_state::ServerState,
};

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route("/{id}/password", patch(change_password))
}

#[derive(Deserialize)]
struct PasswordChange {
    password: String,
}

async fn get_user(
    State(state): State<Arc<ServerState>>,
    _caller: AuthUser,
    WithRejection(Path(user_id), _): IdPath,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.data_manager.get_user(user_id).await?))
}

async fn update_user(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(user_id), _): IdPath,
    WithRejection(Json(update), _): JsonBody<UserUpdate>,
) -> Result<Json<User>, AppError> {
    caller.require_self(user_id)?;
    if update.email.as_deref().is_some_and(|email| !looks_like_email(email.trim())) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    Ok(Json(state.data_manager.update_user(user_id, update).await?))
}

async fn delete_user(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(user_id), _): IdPath,
) -> Result<Json<Value>, AppError> {
    caller.require_self(user_id)?;
    state.data_manager.delete_user(user_id).await?;
    Ok(message("User deleted"))
}

async fn change_password(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(user_id), _): IdPath,
    WithRejection(Json(change), _): JsonBody<PasswordChange>,
) -> Result<Json<Value>, AppError> {
    caller.require_self(user_id)?;
    check_password(&change.password)?;

    let password_hash = hash_password(change.password, state.bcrypt_cost).await?;
    state.data_manager.set_password_hash(user_id, &password_hash).await?;
    Ok(message("Password updated"))
}
