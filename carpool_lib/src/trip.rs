use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A carpool offer from a driver to a match.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Trip {
    pub id: i64,
    pub match_id: i64,
    pub driver_id: i64,
    #[serde(with = "departure_time")]
    pub departure_time: NaiveDateTime,
    pub departure_location: String,
    pub arrival_location: String,
    pub available_seats: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// A trip together with the name of its driver, as listed on a match page.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TripWithDriver {
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    #[serde(flatten)]
    pub trip: Trip,
    pub first_name: String,
    pub last_name: String,
}

/// Body of a trip creation. The driver is whoever is authenticated.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub match_id: i64,
    #[serde(with = "departure_time")]
    pub departure_time: NaiveDateTime,
    pub departure_location: String,
    pub arrival_location: String,
    pub available_seats: i64,
    pub price: f64,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct TripUpdate {
    #[serde(default, deserialize_with = "departure_time::option::deserialize")]
    pub departure_time: Option<NaiveDateTime>,
    pub departure_location: Option<String>,
    pub arrival_location: Option<String>,
    pub available_seats: Option<i64>,
    pub price: Option<f64>,
}

/// Departure times come from `datetime-local` inputs, which omit seconds.
pub mod departure_time {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
    const INPUT_FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(OUTPUT_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid departure time: {raw}")))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{de, Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid departure time: {raw}"))))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn kick_off() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 17)
            .and_then(|date| date.and_hms_opt(18, 30, 0))
            .unwrap()
    }

    #[test]
    fn accepts_datetime_local_without_seconds() {
        assert_eq!(departure_time::parse("2025-05-17T18:30"), Some(kick_off()));
        assert_eq!(departure_time::parse("2025-05-17T18:30:00"), Some(kick_off()));
        assert_eq!(departure_time::parse("2025-05-17 18:30:00"), Some(kick_off()));
        assert_eq!(departure_time::parse(" 2025-05-17 18:30 "), Some(kick_off()));
        assert_eq!(departure_time::parse("17/05/2025 18:30"), None);
    }

    #[test]
    fn new_trip_from_form_payload() {
        let trip: NewTrip = serde_json::from_str(r#"{
            "match_id": 497410,
            "driver_id": 3,
            "departure_time": "2025-05-17T18:30",
            "departure_location": "Lyon Part-Dieu",
            "arrival_location": "Groupama Stadium",
            "available_seats": 3,
            "price": 5
        }"#).unwrap();

        assert_eq!(trip.departure_time, kick_off());
        assert_eq!(trip.available_seats, 3);
        assert_eq!(trip.price, 5.0);
    }

    #[test]
    fn partial_update_keeps_missing_fields_empty() {
        let update: TripUpdate = serde_json::from_str(r#"{ "available_seats": 2 }"#).unwrap();
        assert_eq!(update.available_seats, Some(2));
        assert!(update.departure_time.is_none());

        let bad = serde_json::from_str::<TripUpdate>(r#"{ "departure_time": "tomorrow" }"#);
        assert!(bad.is_err());
    }

    #[test]
    fn driver_names_are_flattened_into_the_trip() {
        let listed = TripWithDriver {
            trip: Trip {
                id: 1,
                match_id: 497410,
                driver_id: 3,
                departure_time: kick_off(),
                departure_location: "Lyon Part-Dieu".into(),
                arrival_location: "Groupama Stadium".into(),
                available_seats: 3,
                price: 5.0,
                created_at: Utc::now(),
            },
            first_name: "Camille".into(),
            last_name: "Durand".into(),
        };

        let json = serde_json::to_value(&listed).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["departure_time"], "2025-05-17T18:30:00");
        assert_eq!(json["first_name"], "Camille");
    }
}
