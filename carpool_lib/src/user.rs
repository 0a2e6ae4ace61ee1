use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A registered user. The password hash never leaves the data layer.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub id_favourite_team: Option<i64>,
    pub registration_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub id_favourite_team: Option<i64>,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// `Some(None)`, sent as an explicit `null`, clears the favourite team.
    #[serde(default, deserialize_with = "nullable")]
    pub id_favourite_team: Option<Option<i64>>,
}

/// Tells a present `null` apart from a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favourite_team_can_be_kept_set_or_cleared() {
        let kept: UserUpdate = serde_json::from_str(r#"{"first_name": "Camille"}"#).unwrap();
        assert_eq!(kept.id_favourite_team, None);

        let set: UserUpdate = serde_json::from_str(r#"{"id_favourite_team": 524}"#).unwrap();
        assert_eq!(set.id_favourite_team, Some(Some(524)));

        let cleared: UserUpdate = serde_json::from_str(r#"{"id_favourite_team": null}"#).unwrap();
        assert_eq!(cleared.id_favourite_team, Some(None));
    }
}
