use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use carpool_lib::trip_passenger::{JoinTrip, PassengerTrip, ReservationUpdate, TripPassenger};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{IdPath, JsonBody};
use crate::{auth::AuthUser, error::AppError, server_state::ServerState};

pub fn router() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/", post(join_trip).get(get_reservations))
        // DELETE takes the trip id: a passenger holds at most one reservation per trip.
        .route("/{id}", get(get_reservation).patch(update_reservation).delete(cancel_reservation))
        .route("/user/{id}", get(get_trips_by_passenger))
}

#[derive(Deserialize)]
struct ReservationFilter {
    trip_id: Option<i64>,
}

async fn join_trip(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Json(request), _): JsonBody<JoinTrip>,
) -> Result<(StatusCode, Json<TripPassenger>), AppError> {
    let reservation = state.data_manager.join_trip(request.trip_id, caller.id, request.seats_reserved).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn get_reservations(
    State(state): State<Arc<ServerState>>,
    _caller: AuthUser,
    WithRejection(Query(filter), _): WithRejection<Query<ReservationFilter>, AppError>,
) -> Result<Json<Vec<TripPassenger>>, AppError> {
    Ok(Json(state.data_manager.get_reservations(filter.trip_id).await?))
}

async fn get_reservation(
    State(state): State<Arc<ServerState>>,
    _caller: AuthUser,
    WithRejection(Path(reservation_id), _): IdPath,
) -> Result<Json<TripPassenger>, AppError> {
    Ok(Json(state.data_manager.get_reservation(reservation_id).await?))
}

async fn get_trips_by_passenger(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(user_id), _): IdPath,
) -> Result<Json<Vec<PassengerTrip>>, AppError> {
    caller.require_self(user_id)?;
    Ok(Json(state.data_manager.get_trips_by_passenger(user_id).await?))
}

async fn update_reservation(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(reservation_id), _): IdPath,
    WithRejection(Json(update), _): JsonBody<ReservationUpdate>,
) -> Result<Json<TripPassenger>, AppError> {
    let reservation = state.data_manager.get_reservation(reservation_id).await?;
    if reservation.user_id != caller.id {
        let trip = state.data_manager.get_trip(reservation.trip_id).await?;
        if trip.driver_id != caller.id {
            return Err(AppError::Forbidden("Only the passenger or the driver can change this reservation"));
        }
    }

    Ok(Json(state.data_manager.update_reservation(reservation_id, update).await?))
}

async fn cancel_reservation(
    State(state): State<Arc<ServerState>>,
    caller: AuthUser,
    WithRejection(Path(trip_id), _): IdPath,
) -> Result<Json<Value>, AppError> {
    let seats = state.data_manager.cancel_reservation(trip_id, caller.id).await?;
    Ok(Json(json!({ "message": "Reservation cancelled", "seats_released": seats })))
}
