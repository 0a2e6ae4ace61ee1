use std::path::{Path, PathBuf};

use carpool_lib::{
    chat::normalize_message,
    message::ChatMessage,
    trip::{NewTrip, Trip, TripUpdate, TripWithDriver},
    trip_passenger::{PassengerTrip, ReservationUpdate, TripPassenger},
    user::{NewUser, User, UserUpdate},
};
use chrono::Utc;

use crate::{database::db::CarpoolDatabase, DataManagerError};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: CarpoolDatabase,
}

/// The public interface for all carpool data management.
impl DataManager {
    /// Opens (creating if needed) the database file. Relative paths are taken from the project root.
    pub async fn start(database_path: &Path) -> Result<Self, DataManagerError> {
        let path = resolve_path(database_path);

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        tracing::info!("Opening database at {}", path.display());
        let database = CarpoolDatabase::connect(&path).await?;

        Ok(DataManager {
            database,
        })
    }

    pub async fn in_memory() -> Result<Self, DataManagerError> {
        Ok(DataManager {
            database: CarpoolDatabase::connect_in_memory().await?,
        })
    }

    // Users

    pub async fn register_user(&self, user: NewUser) -> Result<User, DataManagerError> {
        let user = NewUser {
            first_name: required("first_name", &user.first_name)?,
            last_name: required("last_name", &user.last_name)?,
            email: required("email", &user.email)?,
            ..user
        };

        let user = self.database.insert_user(&user, Utc::now()).await?;
        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, DataManagerError> {
        self.database.get_user(user_id).await
    }

    /// The user registered under `email` and their password hash.
    pub async fn get_credentials(&self, email: &str) -> Result<Option<(User, String)>, DataManagerError> {
        self.database.get_credentials(email.trim()).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, DataManagerError> {
        self.database.email_exists(email.trim()).await
    }

    pub async fn update_user(&self, user_id: i64, update: UserUpdate) -> Result<User, DataManagerError> {
        let update = UserUpdate {
            first_name: update.first_name.as_deref().map(|name| required("first_name", name)).transpose()?,
            last_name: update.last_name.as_deref().map(|name| required("last_name", name)).transpose()?,
            email: update.email.as_deref().map(|email| required("email", email)).transpose()?,
            id_favourite_team: update.id_favourite_team,
        };

        self.database.update_user(user_id, &update).await
    }

    pub async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), DataManagerError> {
        self.database.set_password(user_id, password_hash).await
    }

    /// Removes the account. Trips it drove go with it; seats it held go back to their trips.
    pub async fn delete_user(&self, user_id: i64) -> Result<(), DataManagerError> {
        self.database.delete_user(user_id).await?;
        tracing::info!("Deleted user {user_id}");
        Ok(())
    }

    // Trips

    pub async fn create_trip(&self, driver_id: i64, trip: NewTrip) -> Result<Trip, DataManagerError> {
        if trip.available_seats < 1 {
            return Err(DataManagerError::InvalidInput("A trip needs at least one seat".to_string()));
        }
        check_price(trip.price)?;

        let trip = NewTrip {
            departure_location: required("departure_location", &trip.departure_location)?,
            arrival_location: required("arrival_location", &trip.arrival_location)?,
            ..trip
        };

        let trip = self.database.insert_trip(driver_id, &trip, Utc::now()).await?;
        tracing::info!("User {driver_id} offers trip {} to match {}", trip.id, trip.match_id);
        Ok(trip)
    }

    pub async fn get_trips(&self) -> Result<Vec<Trip>, DataManagerError> {
        self.database.get_trips().await
    }

    pub async fn get_trip(&self, trip_id: i64) -> Result<Trip, DataManagerError> {
        self.database.get_trip(trip_id).await
    }

    /// Trips to a match with their driver's name, earliest departure first.
    pub async fn get_trips_by_match(&self, match_id: i64) -> Result<Vec<TripWithDriver>, DataManagerError> {
        self.database.get_trips_by_match(match_id).await
    }

    pub async fn get_trips_by_driver(&self, driver_id: i64) -> Result<Vec<Trip>, DataManagerError> {
        self.database.get_trips_by_driver(driver_id).await
    }

    pub async fn update_trip(&self, trip_id: i64, update: TripUpdate) -> Result<Trip, DataManagerError> {
        if update.available_seats.is_some_and(|seats| seats < 0) {
            return Err(DataManagerError::InvalidInput("Available seats cannot be negative".to_string()));
        }
        if let Some(price) = update.price {
            check_price(price)?;
        }

        let update = TripUpdate {
            departure_location: update.departure_location.as_deref().map(|l| required("departure_location", l)).transpose()?,
            arrival_location: update.arrival_location.as_deref().map(|l| required("arrival_location", l)).transpose()?,
            ..update
        };

        self.database.update_trip(trip_id, &update).await
    }

    pub async fn delete_trip(&self, trip_id: i64) -> Result<(), DataManagerError> {
        self.database.delete_trip(trip_id).await?;
        tracing::info!("Deleted trip {trip_id}");
        Ok(())
    }

    // Reservations

    /// Reserves seats for a passenger. Seats come off the trip in the same
    /// transaction, and only if enough remain.
    pub async fn join_trip(&self, trip_id: i64, user_id: i64, seats: i64) -> Result<TripPassenger, DataManagerError> {
        if seats < 1 {
            return Err(DataManagerError::InvalidInput("At least one seat must be reserved".to_string()));
        }

        let reservation = self.database.reserve_seats(trip_id, user_id, seats, Utc::now()).await?;
        tracing::info!("User {user_id} reserved {seats} seat(s) on trip {trip_id}");
        Ok(reservation)
    }

    /// Cancels the passenger's reservation and returns the number of seats handed back.
    pub async fn cancel_reservation(&self, trip_id: i64, user_id: i64) -> Result<i64, DataManagerError> {
        let seats = self.database.release_seats(trip_id, user_id).await?;
        tracing::info!("User {user_id} released {seats} seat(s) on trip {trip_id}");
        Ok(seats)
    }

    pub async fn update_reservation(&self, reservation_id: i64, update: ReservationUpdate) -> Result<TripPassenger, DataManagerError> {
        if update.seats_reserved.is_some_and(|seats| seats < 1) {
            return Err(DataManagerError::InvalidInput("At least one seat must be reserved".to_string()));
        }

        self.database.update_reservation(reservation_id, &update).await
    }

    pub async fn get_reservation(&self, reservation_id: i64) -> Result<TripPassenger, DataManagerError> {
        self.database.get_reservation(reservation_id).await
    }

    pub async fn get_reservations(&self, trip_id: Option<i64>) -> Result<Vec<TripPassenger>, DataManagerError> {
        match trip_id {
            Some(trip_id) => self.database.get_trip_reservations(trip_id).await,
            None => self.database.get_reservations().await,
        }
    }

    pub async fn get_trips_by_passenger(&self, user_id: i64) -> Result<Vec<PassengerTrip>, DataManagerError> {
        self.database.get_trips_by_passenger(user_id).await
    }

    /// Whether the user drives or holds a seat on the trip.
    pub async fn is_trip_participant(&self, trip_id: i64, user_id: i64) -> Result<bool, DataManagerError> {
        self.database.is_trip_participant(trip_id, user_id).await
    }

    // Chat

    pub async fn post_message(&self, trip_id: i64, author: &User, text: &str) -> Result<ChatMessage, DataManagerError> {
        let text = normalize_message(text).map_err(|reason| DataManagerError::InvalidInput(reason.to_string()))?;
        self.database.insert_message(trip_id, author, &text, Utc::now()).await
    }

    /// Full history of a trip's chat, oldest first.
    pub async fn get_messages(&self, trip_id: i64) -> Result<Vec<ChatMessage>, DataManagerError> {
        self.database.get_messages(trip_id).await
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match project_root::get_project_root() {
        Ok(root) => root.join(path),
        Err(_) => path.to_path_buf(),
    }
}

fn required(field: &str, value: &str) -> Result<String, DataManagerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DataManagerError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn check_price(price: f64) -> Result<(), DataManagerError> {
    if !price.is_finite() || price < 0.0 {
        return Err(DataManagerError::InvalidInput("Price must be a non-negative number".to_string()));
    }
    Ok(())
}
