use std::{path::Path, str::FromStr};

use carpool_lib::{
    message::ChatMessage,
    trip::{NewTrip, Trip, TripUpdate, TripWithDriver},
    trip_passenger::{PassengerTrip, ReservationUpdate, TripPassenger},
    user::{NewUser, User, UserUpdate},
};
use chrono::{DateTime, Utc};
use const_format::concatcp;
use sqlx::{
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Executor, FromRow, Pool, Row, Sqlite, SqliteConnection,
};

use crate::DataManagerError;

use super::constants::*;

const USER_COLUMNS: &str = concatcp!(
    USER_ID, ", ", FIRST_NAME, ", ", LAST_NAME, ", ", EMAIL, ", ", FAVOURITE_TEAM, ", ", REGISTRATION_DATE
);

const TRIP_COLUMNS: &str = concatcp!(
    TRIP_ID, ", ", MATCH_ID, ", ", DRIVER_ID, ", ", DEPARTURE_TIME, ", ", DEPARTURE_LOCATION, ", ",
    ARRIVAL_LOCATION, ", ", AVAILABLE_SEATS, ", ", PRICE, ", ", CREATED_AT
);

// Same columns, qualified with the `t` alias for joins.
const TRIP_COLUMNS_T: &str = concatcp!(
    "t.", TRIP_ID, ", t.", MATCH_ID, ", t.", DRIVER_ID, ", t.", DEPARTURE_TIME, ", t.", DEPARTURE_LOCATION, ", t.",
    ARRIVAL_LOCATION, ", t.", AVAILABLE_SEATS, ", t.", PRICE, ", t.", CREATED_AT
);

const RESERVATION_COLUMNS: &str = concatcp!(
    RESERVATION_ID, ", ", PASSENGER_TRIP_ID, ", ", PASSENGER_USER_ID, ", ", SEATS_RESERVED, ", ", STATUS, ", ", CREATED_AT
);

#[derive(Clone)]
pub struct CarpoolDatabase {
    pool: Pool<Sqlite>,
}

impl CarpoolDatabase {
    pub async fn connect(path: &Path) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    /// A private database living as long as the returned handle. Each in-memory
    /// connection is its own database, so the pool is pinned to one connection.
    pub async fn connect_in_memory() -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options).await?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", USERS_TABLE_NAME, "(",
                USER_ID,           " INTEGER PRIMARY KEY AUTOINCREMENT,",
                FIRST_NAME,        " TEXT NOT NULL,",
                LAST_NAME,         " TEXT NOT NULL,",
                EMAIL,             " TEXT NOT NULL UNIQUE COLLATE NOCASE,",
                PASSWORD,          " TEXT NOT NULL,",
                FAVOURITE_TEAM,    " INTEGER,",
                REGISTRATION_DATE, " TIMESTAMP NOT NULL);

            CREATE TABLE IF NOT EXISTS ", TRIPS_TABLE_NAME, "(",
                TRIP_ID,            " INTEGER PRIMARY KEY AUTOINCREMENT,",
                MATCH_ID,           " INTEGER NOT NULL,",
                DRIVER_ID,          " INTEGER NOT NULL,",
                DEPARTURE_TIME,     " TIMESTAMP NOT NULL,",
                DEPARTURE_LOCATION, " TEXT NOT NULL,",
                ARRIVAL_LOCATION,   " TEXT NOT NULL,",
                AVAILABLE_SEATS,    " INTEGER NOT NULL CHECK (", AVAILABLE_SEATS, " >= 0),",
                PRICE,              " REAL NOT NULL,",
                CREATED_AT,         " TIMESTAMP NOT NULL,
                FOREIGN KEY(", DRIVER_ID, ") REFERENCES ", USERS_TABLE_NAME, "(", USER_ID, ") ON DELETE CASCADE);

            CREATE INDEX IF NOT EXISTS trips_match_idx ON ", TRIPS_TABLE_NAME, "(", MATCH_ID, ");

            CREATE TABLE IF NOT EXISTS ", TRIP_PASSENGERS_TABLE_NAME, "(",
                RESERVATION_ID,    " INTEGER PRIMARY KEY AUTOINCREMENT,",
                PASSENGER_TRIP_ID, " INTEGER NOT NULL,",
                PASSENGER_USER_ID, " INTEGER NOT NULL,",
                SEATS_RESERVED,    " INTEGER NOT NULL CHECK (", SEATS_RESERVED, " > 0),",
                STATUS,            " TEXT NOT NULL DEFAULT 'confirmed',",
                CREATED_AT,        " TIMESTAMP NOT NULL,
                UNIQUE(", PASSENGER_TRIP_ID, ", ", PASSENGER_USER_ID, "),
                FOREIGN KEY(", PASSENGER_TRIP_ID, ") REFERENCES ", TRIPS_TABLE_NAME, "(", TRIP_ID, ") ON DELETE CASCADE,
                FOREIGN KEY(", PASSENGER_USER_ID, ") REFERENCES ", USERS_TABLE_NAME, "(", USER_ID, ") ON DELETE CASCADE);

            CREATE TABLE IF NOT EXISTS ", MESSAGES_TABLE_NAME, "(",
                MESSAGE_ID,      " INTEGER PRIMARY KEY AUTOINCREMENT,",
                MESSAGE_TRIP_ID, " INTEGER NOT NULL,",
                MESSAGE_USER_ID, " INTEGER,",
                USERNAME,        " TEXT NOT NULL,",
                MESSAGE,         " TEXT NOT NULL,",
                CREATED_AT,      " TIMESTAMP NOT NULL,
                FOREIGN KEY(", MESSAGE_TRIP_ID, ") REFERENCES ", TRIPS_TABLE_NAME, "(", TRIP_ID, ") ON DELETE CASCADE,
                FOREIGN KEY(", MESSAGE_USER_ID, ") REFERENCES ", USERS_TABLE_NAME, "(", USER_ID, ") ON DELETE SET NULL);

            CREATE INDEX IF NOT EXISTS messages_trip_idx ON ", MESSAGES_TABLE_NAME, "(", MESSAGE_TRIP_ID, ");
        ")).await?;

        Ok(())
    }

    // Users

    pub async fn insert_user(&self, user: &NewUser, registration_date: DateTime<Utc>) -> Result<User, DataManagerError> {
        query_as::<_, User>(concatcp!("
            INSERT INTO ", USERS_TABLE_NAME, "(",
            FIRST_NAME, ", ", LAST_NAME, ", ", EMAIL, ", ", PASSWORD, ", ", FAVOURITE_TEAM, ", ", REGISTRATION_DATE, ")
            VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING ", USER_COLUMNS))
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.id_favourite_team)
                .bind(registration_date)
                .fetch_one(&self.pool).await
                .map_err(|err| DataManagerError::conflict_on_unique(err, "Email already registered"))
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, DataManagerError> {
        query_as::<_, User>(concatcp!("SELECT ", USER_COLUMNS, " FROM ", USERS_TABLE_NAME, " WHERE ", USER_ID, " = ?1"))
            .bind(user_id)
            .fetch_optional(&self.pool).await?
            .ok_or(DataManagerError::NotFound("User"))
    }

    /// The user and their password hash, for login.
    pub async fn get_credentials(&self, email: &str) -> Result<Option<(User, String)>, DataManagerError> {
        let row = query(concatcp!("SELECT ", USER_COLUMNS, ", ", PASSWORD, " FROM ", USERS_TABLE_NAME, " WHERE ", EMAIL, " = ?1"))
            .bind(email)
            .fetch_optional(&self.pool).await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some((User::from_row(&row)?, row.try_get(PASSWORD)?)))
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, DataManagerError> {
        let count = query_scalar::<_, i64>(concatcp!("SELECT COUNT(*) FROM ", USERS_TABLE_NAME, " WHERE ", EMAIL, " = ?1"))
            .bind(email)
            .fetch_one(&self.pool).await?;

        Ok(count > 0)
    }

    pub async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<User, DataManagerError> {
        query_as::<_, User>(concatcp!("
            UPDATE ", USERS_TABLE_NAME, " SET ",
                FIRST_NAME,     " = COALESCE(?1, ", FIRST_NAME, "), ",
                LAST_NAME,      " = COALESCE(?2, ", LAST_NAME, "), ",
                EMAIL,          " = COALESCE(?3, ", EMAIL, "), ",
                FAVOURITE_TEAM, " = CASE WHEN ?4 THEN ?5 ELSE ", FAVOURITE_TEAM, " END
            WHERE ", USER_ID, " = ?6 RETURNING ", USER_COLUMNS))
                .bind(&update.first_name)
                .bind(&update.last_name)
                .bind(&update.email)
                .bind(update.id_favourite_team.is_some())
                .bind(update.id_favourite_team.flatten())
                .bind(user_id)
                .fetch_optional(&self.pool).await
                .map_err(|err| DataManagerError::conflict_on_unique(err, "Email already registered"))?
                .ok_or(DataManagerError::NotFound("User"))
    }

    pub async fn set_password(&self, user_id: i64, password_hash: &str) -> Result<(), DataManagerError> {
        let result = query(concatcp!("UPDATE ", USERS_TABLE_NAME, " SET ", PASSWORD, " = ?1 WHERE ", USER_ID, " = ?2"))
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DataManagerError::NotFound("User"));
        }

        Ok(())
    }

    /// Deletes a user after handing their reserved seats back to the trips they joined.
    pub async fn delete_user(&self, user_id: i64) -> Result<(), DataManagerError> {
        let mut tx = self.pool.begin().await?;

        query(concatcp!("
            UPDATE ", TRIPS_TABLE_NAME, " SET ", AVAILABLE_SEATS, " = ", AVAILABLE_SEATS, " + (
                SELECT tp.", SEATS_RESERVED, " FROM ", TRIP_PASSENGERS_TABLE_NAME, " tp
                WHERE tp.", PASSENGER_TRIP_ID, " = ", TRIPS_TABLE_NAME, ".", TRIP_ID, " AND tp.", PASSENGER_USER_ID, " = ?1)
            WHERE ", TRIP_ID, " IN (
                SELECT ", PASSENGER_TRIP_ID, " FROM ", TRIP_PASSENGERS_TABLE_NAME, " WHERE ", PASSENGER_USER_ID, " = ?1)"))
                .bind(user_id)
                .execute(&mut *tx).await?;

        let result = query(concatcp!("DELETE FROM ", USERS_TABLE_NAME, " WHERE ", USER_ID, " = ?1"))
            .bind(user_id)
            .execute(&mut *tx).await?;

        if result.rows_affected() == 0 {
            return Err(DataManagerError::NotFound("User"));
        }

        tx.commit().await?;
        Ok(())
    }

    // Trips

    pub async fn insert_trip(&self, driver_id: i64, trip: &NewTrip, created_at: DateTime<Utc>) -> Result<Trip, DataManagerError> {
        query_as::<_, Trip>(concatcp!("
            INSERT INTO ", TRIPS_TABLE_NAME, "(",
            MATCH_ID, ", ", DRIVER_ID, ", ", DEPARTURE_TIME, ", ", DEPARTURE_LOCATION, ", ", ARRIVAL_LOCATION, ", ",
            AVAILABLE_SEATS, ", ", PRICE, ", ", CREATED_AT, ")
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING ", TRIP_COLUMNS))
                .bind(trip.match_id)
                .bind(driver_id)
                .bind(trip.departure_time)
                .bind(&trip.departure_location)
                .bind(&trip.arrival_location)
                .bind(trip.available_seats)
                .bind(trip.price)
                .bind(created_at)
                .fetch_one(&self.pool).await
                .map_err(|err| match &err {
                    sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => DataManagerError::NotFound("User"),
                    _ => DataManagerError::Database(err),
                })
    }

    pub async fn get_trips(&self) -> Result<Vec<Trip>, DataManagerError> {
        Ok(query_as::<_, Trip>(concatcp!("SELECT ", TRIP_COLUMNS, " FROM ", TRIPS_TABLE_NAME, " ORDER BY ", DEPARTURE_TIME, " ASC"))
            .fetch_all(&self.pool).await?)
    }

    pub async fn get_trip(&self, trip_id: i64) -> Result<Trip, DataManagerError> {
        query_as::<_, Trip>(concatcp!("SELECT ", TRIP_COLUMNS, " FROM ", TRIPS_TABLE_NAME, " WHERE ", TRIP_ID, " = ?1"))
            .bind(trip_id)
            .fetch_optional(&self.pool).await?
            .ok_or(DataManagerError::NotFound("Trip"))
    }

    pub async fn get_trips_by_match(&self, match_id: i64) -> Result<Vec<TripWithDriver>, DataManagerError> {
        Ok(query_as::<_, TripWithDriver>(concatcp!("
            SELECT ", TRIP_COLUMNS_T, ", u.", FIRST_NAME, ", u.", LAST_NAME, "
            FROM ", TRIPS_TABLE_NAME, " t
            JOIN ", USERS_TABLE_NAME, " u ON u.", USER_ID, " = t.", DRIVER_ID, "
            WHERE t.", MATCH_ID, " = ?1
            ORDER BY t.", DEPARTURE_TIME, " ASC"))
                .bind(match_id)
                .fetch_all(&self.pool).await?)
    }

    pub async fn get_trips_by_driver(&self, driver_id: i64) -> Result<Vec<Trip>, DataManagerError> {
        Ok(query_as::<_, Trip>(concatcp!("SELECT ", TRIP_COLUMNS, " FROM ", TRIPS_TABLE_NAME, " WHERE ", DRIVER_ID, " = ?1 ORDER BY ", DEPARTURE_TIME, " ASC"))
            .bind(driver_id)
            .fetch_all(&self.pool).await?)
    }

    pub async fn update_trip(&self, trip_id: i64, update: &TripUpdate) -> Result<Trip, DataManagerError> {
        query_as::<_, Trip>(concatcp!("
            UPDATE ", TRIPS_TABLE_NAME, " SET ",
                DEPARTURE_TIME,     " = COALESCE(?1, ", DEPARTURE_TIME, "), ",
                DEPARTURE_LOCATION, " = COALESCE(?2, ", DEPARTURE_LOCATION, "), ",
                ARRIVAL_LOCATION,   " = COALESCE(?3, ", ARRIVAL_LOCATION, "), ",
                AVAILABLE_SEATS,    " = COALESCE(?4, ", AVAILABLE_SEATS, "), ",
                PRICE,              " = COALESCE(?5, ", PRICE, ")
            WHERE ", TRIP_ID, " = ?6 RETURNING ", TRIP_COLUMNS))
                .bind(update.departure_time)
                .bind(&update.departure_location)
                .bind(&update.arrival_location)
                .bind(update.available_seats)
                .bind(update.price)
                .bind(trip_id)
                .fetch_optional(&self.pool).await?
                .ok_or(DataManagerError::NotFound("Trip"))
    }

    pub async fn delete_trip(&self, trip_id: i64) -> Result<(), DataManagerError> {
        let result = query(concatcp!("DELETE FROM ", TRIPS_TABLE_NAME, " WHERE ", TRIP_ID, " = ?1"))
            .bind(trip_id)
            .execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DataManagerError::NotFound("Trip"));
        }

        Ok(())
    }

    // Reservations

    /// Takes `seats` off the trip and records the reservation, or changes nothing.
    pub async fn reserve_seats(&self, trip_id: i64, user_id: i64, seats: i64, created_at: DateTime<Utc>) -> Result<TripPassenger, DataManagerError> {
        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock before it reads.
        let taken = query(concatcp!("
            UPDATE ", TRIPS_TABLE_NAME, " SET ", AVAILABLE_SEATS, " = ", AVAILABLE_SEATS, " - ?1
            WHERE ", TRIP_ID, " = ?2 AND ", AVAILABLE_SEATS, " >= ?1 AND ", DRIVER_ID, " != ?3"))
                .bind(seats)
                .bind(trip_id)
                .bind(user_id)
                .execute(&mut *tx).await?
                .rows_affected();

        if taken == 0 {
            let (driver_id, available) = trip_seats(&mut *tx, trip_id).await?;
            if driver_id == user_id {
                return Err(DataManagerError::InvalidInput("Drivers cannot reserve seats on their own trip".to_string()));
            }
            return Err(DataManagerError::SeatsUnavailable { requested: seats, available });
        }

        let reservation = query_as::<_, TripPassenger>(concatcp!("
            INSERT INTO ", TRIP_PASSENGERS_TABLE_NAME, "(",
            PASSENGER_TRIP_ID, ", ", PASSENGER_USER_ID, ", ", SEATS_RESERVED, ", ", STATUS, ", ", CREATED_AT, ")
            VALUES (?1, ?2, ?3, 'confirmed', ?4) RETURNING ", RESERVATION_COLUMNS))
                .bind(trip_id)
                .bind(user_id)
                .bind(seats)
                .bind(created_at)
                .fetch_one(&mut *tx).await
                .map_err(|err| match &err {
                    sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => DataManagerError::NotFound("User"),
                    _ => DataManagerError::conflict_on_unique(err, "You already have a reservation on this trip"),
                })?;

        tx.commit().await?;
        Ok(reservation)
    }

    /// Removes the user's reservation on the trip and returns its seats. Returns the seats released.
    pub async fn release_seats(&self, trip_id: i64, user_id: i64) -> Result<i64, DataManagerError> {
        let mut tx = self.pool.begin().await?;

        let seats = query_scalar::<_, i64>(concatcp!("
            DELETE FROM ", TRIP_PASSENGERS_TABLE_NAME, "
            WHERE ", PASSENGER_TRIP_ID, " = ?1 AND ", PASSENGER_USER_ID, " = ?2
            RETURNING ", SEATS_RESERVED))
                .bind(trip_id)
                .bind(user_id)
                .fetch_optional(&mut *tx).await?
                .ok_or(DataManagerError::NotFound("Reservation"))?;

        query(concatcp!("UPDATE ", TRIPS_TABLE_NAME, " SET ", AVAILABLE_SEATS, " = ", AVAILABLE_SEATS, " + ?1 WHERE ", TRIP_ID, " = ?2"))
            .bind(seats)
            .bind(trip_id)
            .execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(seats)
    }

    /// Applies a status and/or seat change; a seat change moves the difference to or from the trip.
    pub async fn update_reservation(&self, reservation_id: i64, update: &ReservationUpdate) -> Result<TripPassenger, DataManagerError> {
        let mut tx = self.pool.begin().await?;

        // A no-op write, so the transaction holds the write lock before it reads.
        let (trip_id, current) = query_as::<_, (i64, i64)>(concatcp!("
            UPDATE ", TRIP_PASSENGERS_TABLE_NAME, " SET ", SEATS_RESERVED, " = ", SEATS_RESERVED, "
            WHERE ", RESERVATION_ID, " = ?1 RETURNING ", PASSENGER_TRIP_ID, ", ", SEATS_RESERVED))
                .bind(reservation_id)
                .fetch_optional(&mut *tx).await?
                .ok_or(DataManagerError::NotFound("Reservation"))?;

        if let Some(seats) = update.seats_reserved {
            let delta = seats - current;
            if delta > 0 {
                let taken = query(concatcp!("
                    UPDATE ", TRIPS_TABLE_NAME, " SET ", AVAILABLE_SEATS, " = ", AVAILABLE_SEATS, " - ?1
                    WHERE ", TRIP_ID, " = ?2 AND ", AVAILABLE_SEATS, " >= ?1"))
                        .bind(delta)
                        .bind(trip_id)
                        .execute(&mut *tx).await?
                        .rows_affected();

                if taken == 0 {
                    let (_, available) = trip_seats(&mut *tx, trip_id).await?;
                    return Err(DataManagerError::SeatsUnavailable { requested: delta, available });
                }
            } else if delta < 0 {
                query(concatcp!("UPDATE ", TRIPS_TABLE_NAME, " SET ", AVAILABLE_SEATS, " = ", AVAILABLE_SEATS, " + ?1 WHERE ", TRIP_ID, " = ?2"))
                    .bind(-delta)
                    .bind(trip_id)
                    .execute(&mut *tx).await?;
            }
        }

        let reservation = query_as::<_, TripPassenger>(concatcp!("
            UPDATE ", TRIP_PASSENGERS_TABLE_NAME, " SET ",
                STATUS,         " = COALESCE(?1, ", STATUS, "), ",
                SEATS_RESERVED, " = COALESCE(?2, ", SEATS_RESERVED, ")
            WHERE ", RESERVATION_ID, " = ?3 RETURNING ", RESERVATION_COLUMNS))
                .bind(update.status)
                .bind(update.seats_reserved)
                .bind(reservation_id)
                .fetch_optional(&mut *tx).await?
                .ok_or(DataManagerError::NotFound("Reservation"))?;

        tx.commit().await?;
        Ok(reservation)
    }

    pub async fn get_reservation(&self, reservation_id: i64) -> Result<TripPassenger, DataManagerError> {
        query_as::<_, TripPassenger>(concatcp!("SELECT ", RESERVATION_COLUMNS, " FROM ", TRIP_PASSENGERS_TABLE_NAME, " WHERE ", RESERVATION_ID, " = ?1"))
            .bind(reservation_id)
            .fetch_optional(&self.pool).await?
            .ok_or(DataManagerError::NotFound("Reservation"))
    }

    pub async fn get_reservations(&self) -> Result<Vec<TripPassenger>, DataManagerError> {
        Ok(query_as::<_, TripPassenger>(concatcp!("SELECT ", RESERVATION_COLUMNS, " FROM ", TRIP_PASSENGERS_TABLE_NAME, " ORDER BY ", RESERVATION_ID))
            .fetch_all(&self.pool).await?)
    }

    pub async fn get_trip_reservations(&self, trip_id: i64) -> Result<Vec<TripPassenger>, DataManagerError> {
        Ok(query_as::<_, TripPassenger>(concatcp!(
            "SELECT ", RESERVATION_COLUMNS, " FROM ", TRIP_PASSENGERS_TABLE_NAME, " WHERE ", PASSENGER_TRIP_ID, " = ?1 ORDER BY ", RESERVATION_ID))
                .bind(trip_id)
                .fetch_all(&self.pool).await?)
    }

    pub async fn get_trips_by_passenger(&self, user_id: i64) -> Result<Vec<PassengerTrip>, DataManagerError> {
        Ok(query_as::<_, PassengerTrip>(concatcp!("
            SELECT
                tp.", RESERVATION_ID, " AS passenger_id,
                tp.", SEATS_RESERVED, ",
                tp.", STATUS, ",
                ", TRIP_COLUMNS_T, ",
                u.", FIRST_NAME, ",
                u.", LAST_NAME, ",
                u.", FIRST_NAME, " || ' ' || u.", LAST_NAME, " AS driver_name
            FROM ", TRIP_PASSENGERS_TABLE_NAME, " tp
            JOIN ", TRIPS_TABLE_NAME, " t ON tp.", PASSENGER_TRIP_ID, " = t.", TRIP_ID, "
            JOIN ", USERS_TABLE_NAME, " u ON t.", DRIVER_ID, " = u.", USER_ID, "
            WHERE tp.", PASSENGER_USER_ID, " = ?1
            ORDER BY t.", DEPARTURE_TIME, " ASC"))
                .bind(user_id)
                .fetch_all(&self.pool).await?)
    }

    pub async fn is_trip_participant(&self, trip_id: i64, user_id: i64) -> Result<bool, DataManagerError> {
        let driver_id = query_scalar::<_, i64>(concatcp!("SELECT ", DRIVER_ID, " FROM ", TRIPS_TABLE_NAME, " WHERE ", TRIP_ID, " = ?1"))
            .bind(trip_id)
            .fetch_optional(&self.pool).await?
            .ok_or(DataManagerError::NotFound("Trip"))?;

        if driver_id == user_id {
            return Ok(true);
        }

        let reservations = query_scalar::<_, i64>(concatcp!(
            "SELECT COUNT(*) FROM ", TRIP_PASSENGERS_TABLE_NAME, " WHERE ", PASSENGER_TRIP_ID, " = ?1 AND ", PASSENGER_USER_ID, " = ?2"))
                .bind(trip_id)
                .bind(user_id)
                .fetch_one(&self.pool).await?;

        Ok(reservations > 0)
    }

    // Messages

    pub async fn insert_message(&self, trip_id: i64, author: &User, message: &str, created_at: DateTime<Utc>) -> Result<ChatMessage, DataManagerError> {
        let id = query_scalar::<_, i64>(concatcp!("
            INSERT INTO ", MESSAGES_TABLE_NAME, "(",
            MESSAGE_TRIP_ID, ", ", MESSAGE_USER_ID, ", ", USERNAME, ", ", MESSAGE, ", ", CREATED_AT, ")
            VALUES (?1, ?2, ?3, ?4, ?5) RETURNING ", MESSAGE_ID))
                .bind(trip_id)
                .bind(author.id)
                .bind(&author.first_name)
                .bind(message)
                .bind(created_at)
                .fetch_one(&self.pool).await
                .map_err(|err| match &err {
                    sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => DataManagerError::NotFound("Trip"),
                    _ => DataManagerError::Database(err),
                })?;

        Ok(ChatMessage {
            id,
            trip_id,
            user_id: Some(author.id),
            username: author.first_name.clone(),
            message: message.to_string(),
            created_at,
            first_name: Some(author.first_name.clone()),
            last_name: Some(author.last_name.clone()),
        })
    }

    pub async fn get_messages(&self, trip_id: i64) -> Result<Vec<ChatMessage>, DataManagerError> {
        Ok(query_as::<_, ChatMessage>(concatcp!("
            SELECT m.", MESSAGE_ID, ", m.", MESSAGE_TRIP_ID, ", m.", MESSAGE_USER_ID, ", m.", USERNAME, ", m.", MESSAGE, ", m.", CREATED_AT, ",
                   u.", FIRST_NAME, ", u.", LAST_NAME, "
            FROM ", MESSAGES_TABLE_NAME, " m
            LEFT JOIN ", USERS_TABLE_NAME, " u ON m.", MESSAGE_USER_ID, " = u.", USER_ID, "
            WHERE m.", MESSAGE_TRIP_ID, " = ?1
            ORDER BY m.", CREATED_AT, " ASC, m.", MESSAGE_ID, " ASC"))
                .bind(trip_id)
                .fetch_all(&self.pool).await?)
    }
}

/// Driver and remaining seats of a trip, read inside an open transaction.
async fn trip_seats(conn: &mut SqliteConnection, trip_id: i64) -> Result<(i64, i64), DataManagerError> {
    query_as::<_, (i64, i64)>(concatcp!("SELECT ", DRIVER_ID, ", ", AVAILABLE_SEATS, " FROM ", TRIPS_TABLE_NAME, " WHERE ", TRIP_ID, " = ?1"))
        .bind(trip_id)
        .fetch_optional(conn).await?
        .ok_or(DataManagerError::NotFound("Trip"))
}
