use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat line. `user_id` is gone once the author deletes their
/// account; `username` is what they were called when they wrote it.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub trip_id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
