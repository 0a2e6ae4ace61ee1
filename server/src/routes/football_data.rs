use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::Value;

use super::IdPath;
use crate::{error::AppError, server_state::ServerState};

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/competitions", get(competitions))
        .route("/competitions/{id}", get(competition))
        .route("/competitions/{id}/matches", get(competition_matches))
        .route("/competitions/{id}/teams", get(competition_teams))
        .route("/teams", get(default_teams))
        .route("/teams/{id}", get(team))
        .route("/teams/{id}/matches", get(team_matches))
        .route("/matches/{id}", get(match_by_id))
}

async fn competitions(State(state): State<Arc<ServerState>>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.competitions().await?))
}

async fn competition(State(state): State<Arc<ServerState>>, Path(code): Path<String>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.competition(&code).await?))
}

async fn competition_matches(State(state): State<Arc<ServerState>>, Path(code): Path<String>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.competition_matches(&code).await?))
}

async fn competition_teams(State(state): State<Arc<ServerState>>, Path(code): Path<String>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.competition_teams(&code).await?))
}

async fn default_teams(State(state): State<Arc<ServerState>>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.default_competition_teams().await?))
}

async fn team(State(state): State<Arc<ServerState>>, WithRejection(Path(team_id), _): IdPath) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.team(team_id).await?))
}

async fn team_matches(State(state): State<Arc<ServerState>>, WithRejection(Path(team_id), _): IdPath) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.team_matches(team_id).await?))
}

async fn match_by_id(State(state): State<Arc<ServerState>>, WithRejection(Path(match_id), _): IdPath) -> Result<Json<Value>, AppError> {
    Ok(Json(state.football.match_by_id(match_id).await?))
}
