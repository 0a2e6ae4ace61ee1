pub const USERS_TABLE_NAME: &str = "users";
pub const USER_ID: &str = "id";
pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const EMAIL: &str = "email";
pub const PASSWORD: &str = "password";
pub const FAVOURITE_TEAM: &str = "id_favourite_team";
pub const REGISTRATION_DATE: &str = "registration_date";

pub const TRIPS_TABLE_NAME: &str = "trips";
pub const TRIP_ID: &str = "id";
pub const MATCH_ID: &str = "match_id";
pub const DRIVER_ID: &str = "driver_id";
pub const DEPARTURE_TIME: &str = "departure_time";
pub const DEPARTURE_LOCATION: &str = "departure_location";
pub const ARRIVAL_LOCATION: &str = "arrival_location";
pub const AVAILABLE_SEATS: &str = "available_seats";
pub const PRICE: &str = "price";
pub const CREATED_AT: &str = "created_at";

pub const TRIP_PASSENGERS_TABLE_NAME: &str = "trip_passengers";
pub const RESERVATION_ID: &str = "id";
pub const PASSENGER_TRIP_ID: &str = "trip_id";
pub const PASSENGER_USER_ID: &str = "user_id";
pub const SEATS_RESERVED: &str = "seats_reserved";
pub const STATUS: &str = "status";
// Created at

pub const MESSAGES_TABLE_NAME: &str = "messages";
pub const MESSAGE_ID: &str = "id";
pub const MESSAGE_TRIP_ID: &str = "trip_id";
pub const MESSAGE_USER_ID: &str = "user_id";
pub const USERNAME: &str = "username";
pub const MESSAGE: &str = "message";
// Created at
