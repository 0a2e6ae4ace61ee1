use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::WithRejection;
use carpool_lib::user::NewUser;
use serde::Deserialize;
use serde_json::{json, Value};

use super::JsonBody;
use crate::{
    auth::{check_password, hash_password, looks_like_email, verify_password},
    error::AppError,
    server_state::ServerState,
};

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/check-email", post(check_email))
}

#[derive(Deserialize)]
struct RegisterRequest {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    #[serde(default)]
    id_favourite_team: Option<i64>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct EmailRequest {
    email: String,
}

async fn register(
    State(state): State<Arc<ServerState>>,
    WithRejection(Json(request), _): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    check_password(&request.password)?;
    if !looks_like_email(request.email.trim()) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    let password_hash = hash_password(request.password, state.bcrypt_cost).await?;
    let user = state.data_manager.register_user(NewUser {
        first_name: request.first_name,
        last_name: request.last_name,
        email: request.email,
        password_hash,
        id_favourite_team: request.id_favourite_team,
    }).await?;

    Ok((StatusCode::CREATED, Json(json!({ "message": "User registered successfully", "user": user }))))
}

async fn login(
    State(state): State<Arc<ServerState>>,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let Some((user, password_hash)) = state.data_manager.get_credentials(&request.email).await? else {
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(request.password, password_hash).await? {
        tracing::debug!("Wrong password for user {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    let token = state.tokens.issue(user.id)?;
    Ok(Json(json!({ "token": token, "user": user })))
}

async fn check_email(
    State(state): State<Arc<ServerState>>,
    WithRejection(Json(request), _): JsonBody<EmailRequest>,
) -> Result<Json<Value>, AppError> {
    let exists = state.data_manager.email_exists(request.email.trim()).await?;
    Ok(Json(json!({ "exists": exists })))
}
