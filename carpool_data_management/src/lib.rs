use thiserror::Error;

pub mod database;
pub mod football_data;
mod data_manager;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DEFAULT_DATABASE_PATH: &str = const_format::concatcp!(DATA_DIR, "database.db");

#[derive(Debug, Error)]
pub enum DataManagerError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Not enough seats available: requested {requested}, available {available}")]
    SeatsUnavailable { requested: i64, available: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Football data request failed: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataManagerError {
    /// Turns a unique-constraint failure into a conflict, leaving other errors as is.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::Conflict(message.to_string()),
            _ => Self::Database(err),
        }
    }
}

impl From<reqwest::Error> for DataManagerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}
