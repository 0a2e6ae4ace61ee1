//! Wire format of the trip chat socket.
//!
//! Every frame is a JSON text frame of the form `{"event": <name>, "data": <payload>}`.
//! Event names are the ones the web client already listens for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{message::ChatMessage, user::User};

pub const MAX_MESSAGE_LENGTH: usize = 1000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinTrip {
        #[serde(rename = "tripId")]
        trip_id: i64,
    },
    LeaveTrip {
        #[serde(rename = "tripId")]
        trip_id: i64,
    },
    SendMessage {
        #[serde(rename = "tripId")]
        trip_id: i64,
        message: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    UserJoined(String),
    MessageHistory(Vec<ChatMessage>),
    ReceiveMessage(ChatBroadcast),
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}

/// The author as shown next to a message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for ChatUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatBroadcast {
    pub id: i64,
    #[serde(rename = "tripId")]
    pub trip_id: i64,
    pub message: String,
    pub user: ChatUser,
    pub time: DateTime<Utc>,
}

/// Trims a chat line and checks it is worth relaying.
pub fn normalize_message(raw: &str) -> Result<String, &'static str> {
    let message = raw.trim();
    if message.is_empty() {
        return Err("Message is empty");
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err("Message is too long");
    }
    Ok(message.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_events_use_socket_event_names() {
        let join: ClientEvent = serde_json::from_value(json!({
            "event": "joinTrip",
            "data": { "tripId": 12 }
        })).unwrap();
        assert_eq!(join, ClientEvent::JoinTrip { trip_id: 12 });

        let send: ClientEvent = serde_json::from_value(json!({
            "event": "sendMessage",
            "data": { "tripId": 12, "message": "On part à 18h ?" }
        })).unwrap();
        assert_eq!(send, ClientEvent::SendMessage { trip_id: 12, message: "On part à 18h ?".into() });

        assert!(serde_json::from_value::<ClientEvent>(json!({ "event": "shout", "data": {} })).is_err());
    }

    #[test]
    fn server_events_shape() {
        let joined = serde_json::to_value(ServerEvent::UserJoined("Camille joined the conversation".into())).unwrap();
        assert_eq!(joined, json!({ "event": "userJoined", "data": "Camille joined the conversation" }));

        let error = serde_json::to_value(ServerEvent::error("nope")).unwrap();
        assert_eq!(error, json!({ "event": "error", "data": { "message": "nope" } }));

        let time = Utc::now();
        let received = serde_json::to_value(ServerEvent::ReceiveMessage(ChatBroadcast {
            id: 4,
            trip_id: 12,
            message: "Salut".into(),
            user: ChatUser { id: 1, first_name: "Camille".into(), last_name: "Durand".into() },
            time,
        })).unwrap();
        assert_eq!(received["event"], "receiveMessage");
        assert_eq!(received["data"]["tripId"], 12);
        assert_eq!(received["data"]["user"]["first_name"], "Camille");
    }

    #[test]
    fn messages_are_trimmed_and_bounded() {
        assert_eq!(normalize_message("  salut \n").unwrap(), "salut");
        assert!(normalize_message("   ").is_err());
        assert!(normalize_message(&"é".repeat(MAX_MESSAGE_LENGTH)).is_ok());
        assert!(normalize_message(&"a".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }
}
