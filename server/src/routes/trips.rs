use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use carpool_lib::trip::{NewTrip, Trip, TripUpdate, TripWithDriver};
use serde_json::Value;

use super::{message, IdPath, JsonBody};
use crate::{auth::AuthUser, error::AppError, server_state::ServerState};

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/", get(get_trips).post(create_trip))
        .route("/{id}", get(get_trip).patch(update_trip).delete(delete_trip))
        .route("/match/{id}", get(get_trips_by_match))
        .route("/user/{id}", get(get_trips_by_driver))
}

async fn get_trips(State(state): State<Arc<ServerState>>, _caller: AuthUser) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.data_manager.get_trips().await?))
}

async fn create_trip(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Json(trip), _): JsonBody<NewTrip>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.data_manager.create_trip(caller.id, trip).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn get_trip(
    State(state): State<Arc<ServerState>>,
    _caller: AuthUser,
    WithRejection(Path(trip_id), _): IdPath,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.data_manager.get_trip(trip_id).await?))
}

async fn update_trip(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(trip_id), _): IdPath,
    WithRejection(Json(update), _): JsonBody<TripUpdate>,
) -> Result<Json<Trip>, AppError> {
    require_driver(&state, caller, trip_id).await?;
    Ok(Json(state.data_manager.update_trip(trip_id, update).await?))
}

async fn delete_trip(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(trip_id), _): IdPath,
) -> Result<Json<Value>, AppError> {
    require_driver(&state, caller, trip_id).await?;
    state.data_manager.delete_trip(trip_id).await?;
    Ok(message("Trip deleted"))
}

async fn get_trips_by_match(
    State(state): State<Arc<ServerState>>,
    _caller: AuthUser,
    WithRejection(Path(match_id), _): IdPath,
) -> Result<Json<Vec<TripWithDriver>>, AppError> {
    Ok(Json(state.data_manager.get_trips_by_match(match_id).await?))
}

async fn get_trips_by_driver(
    State(state): State<Arc<ServerState>>,
    _caller: AuthUser,
    WithRejection(Path(driver_id), _): IdPath,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.data_manager.get_trips_by_driver(driver_id).await?))
}

async fn require_driver(state: &ServerState, caller: AuthUser, trip_id: i64) -> Result<Trip, AppError> {
    let trip = state.data_manager.get_trip(trip_id).await?;
    if trip.driver_id != caller.id {
        return Err(AppError::Forbidden("Only the driver can change this trip"));
    }
    Ok(trip)
}
