pub mod chat;
pub mod message;
pub mod trip;
pub mod trip_passenger;
pub mod user;
