use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trip::Trip;

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    #[default]
    Confirmed,
}

/// Seats held by a passenger on somebody else's trip.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TripPassenger {
    pub id: i64,
    pub trip_id: i64,
    pub user_id: i64,
    pub seats_reserved: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

/// A reservation seen from the passenger's side: the trip it is on and who drives.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PassengerTrip {
    pub passenger_id: i64,
    pub seats_reserved: i64,
    pub status: ReservationStatus,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    #[serde(flatten)]
    pub trip: Trip,
    pub first_name: String,
    pub last_name: String,
    pub driver_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinTrip {
    pub trip_id: i64,
    pub seats_reserved: i64,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReservationUpdate {
    pub status: Option<ReservationStatus>,
    pub seats_reserved: Option<i64>,
}
