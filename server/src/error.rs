use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use carpool_data_management::DataManagerError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Access denied: missing or malformed token")]
    Unauthorized,

    #[error("Token invalid or expired")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Data(#[from] DataManagerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Data(err) => match err {
                DataManagerError::NotFound(_) => StatusCode::NOT_FOUND,
                DataManagerError::Conflict(_) => StatusCode::CONFLICT,
                DataManagerError::InvalidInput(_) | DataManagerError::SeatsUnavailable { .. } => StatusCode::BAD_REQUEST,
                DataManagerError::Upstream(_) => StatusCode::BAD_GATEWAY,
                DataManagerError::Database(_) | DataManagerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{self}");
            "Internal server error".to_string()
        } else {
            if status == StatusCode::BAD_GATEWAY {
                tracing::warn!("{self}");
            }
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_errors_map_to_http_statuses() {
        let status = |err: DataManagerError| AppError::from(err).status();

        assert_eq!(status(DataManagerError::NotFound("Trip")), StatusCode::NOT_FOUND);
        assert_eq!(status(DataManagerError::Conflict("taken".into())), StatusCode::CONFLICT);
        assert_eq!(status(DataManagerError::SeatsUnavailable { requested: 3, available: 1 }), StatusCode::BAD_REQUEST);
        assert_eq!(status(DataManagerError::Upstream("503".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(DataManagerError::Io(std::io::Error::other("disk full"))), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn token_failures_are_distinguished() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidToken.status(), StatusCode::FORBIDDEN);
    }
}
