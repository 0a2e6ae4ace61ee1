use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use carpool_data_management::DataManagerError;
use carpool_lib::{
    chat::{ChatBroadcast, ChatUser, ClientEvent, ServerEvent},
    user::User,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    chat_rooms::RoomEvent,
    error::AppError,
    server_state::ServerState,
};

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    token: Option<String>,
}

pub async fn chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ChatParams>,
) -> Result<Response, AppError> {
    let token = params.token.filter(|token| !token.is_empty()).ok_or(AppError::Unauthorized)?;
    let claims = state.tokens.verify(&token)?;
    let user = state.data_manager.get_user(claims.id).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>, user: User) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut queue) = mpsc::channel::<ServerEvent>(state.chat_rooms.capacity());

    let writer = tokio::spawn(async move {
        while let Some(event) = queue.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!("Failed to encode chat event: {err}");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = ChatSession::new(state, user, outbox);
    tracing::info!("Chat connection {} opened by user {}", session.connection_id, session.user.id);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_frame(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!("Chat connection {} read error: {err}", session.connection_id);
                break;
            }
        }
    }

    session.leave_all().await;
    tracing::info!("Chat connection {} closed", session.connection_id);

    // Dropping the last outbox sender lets the writer drain and stop.
    drop(session);
    let _ = writer.await;
}

/// The rooms one socket has joined, and where its outgoing events go.
pub struct ChatSession {
    state: Arc<ServerState>,
    user: User,
    connection_id: u64,
    outbox: mpsc::Sender<ServerEvent>,
    joined: HashMap<i64, JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(state: Arc<ServerState>, user: User, outbox: mpsc::Sender<ServerEvent>) -> Self {
        let connection_id = state.chat_rooms.next_connection_id();
        Self {
            state,
            user,
            connection_id,
            outbox,
            joined: HashMap::new(),
        }
    }

    pub async fn handle_frame(&mut self, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(event).await,
            Err(err) => {
                tracing::debug!("Malformed chat frame on connection {}: {err}", self.connection_id);
                self.send(ServerEvent::error("Malformed message")).await;
            }
        }
    }

    pub async fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::JoinTrip { trip_id } => self.join(trip_id).await,
            ClientEvent::LeaveTrip { trip_id } => self.leave(trip_id).await,
            ClientEvent::SendMessage { trip_id, message } => self.send_message(trip_id, &message).await,
        }
    }

    pub fn is_in(&self, trip_id: i64) -> bool {
        self.joined.contains_key(&trip_id)
    }

    async fn join(&mut self, trip_id: i64) {
        match self.state.data_manager.is_trip_participant(trip_id, self.user.id).await {
            Ok(true) => {}
            Ok(false) => return self.send(ServerEvent::error("You are not part of this trip")).await,
            Err(DataManagerError::NotFound(_)) => return self.send(ServerEvent::error("Trip not found")).await,
            Err(err) => {
                tracing::error!("Failed to check participants of trip {trip_id}: {err}");
                return self.send(ServerEvent::error("Failed to join trip")).await;
            }
        }

        let first_join = !self.is_in(trip_id);
        if first_join {
            let receiver = self.state.chat_rooms.subscribe(trip_id).await;
            let forwarder = tokio::spawn(forward(receiver, self.connection_id, trip_id, self.outbox.clone()));
            self.joined.insert(trip_id, forwarder);
        }

        match self.state.data_manager.get_messages(trip_id).await {
            Ok(history) => self.send(ServerEvent::MessageHistory(history)).await,
            Err(err) => {
                tracing::error!("Failed to load chat history of trip {trip_id}: {err}");
                self.send(ServerEvent::error("Failed to load messages")).await;
            }
        }

        if first_join {
            let announcement = ServerEvent::UserJoined(format!("{} joined the conversation", self.user.first_name));
            self.state.chat_rooms.publish(trip_id, RoomEvent::to_others(self.connection_id, announcement)).await;
            tracing::debug!("User {} joined chat of trip {trip_id}", self.user.id);
        }
    }

    async fn leave(&mut self, trip_id: i64) {
        let Some(forwarder) = self.joined.remove(&trip_id) else {
            return;
        };

        forwarder.abort();
        let _ = forwarder.await;
        self.state.chat_rooms.release(trip_id).await;
        tracing::debug!("User {} left chat of trip {trip_id}", self.user.id);
    }

    pub async fn leave_all(&mut self) {
        let trips: Vec<i64> = self.joined.keys().copied().collect();
        for trip_id in trips {
            self.leave(trip_id).await;
        }
    }

    async fn send_message(&mut self, trip_id: i64, text: &str) {
        if !self.is_in(trip_id) {
            return self.send(ServerEvent::error("Join the trip before sending messages")).await;
        }

        // Seats can be cancelled while the socket stays open.
        match self.state.data_manager.is_trip_participant(trip_id, self.user.id).await {
            Ok(true) => {}
            Ok(false) | Err(DataManagerError::NotFound(_)) => {
                self.leave(trip_id).await;
                return self.send(ServerEvent::error("You are not part of this trip")).await;
            }
            Err(err) => {
                tracing::error!("Failed to check participants of trip {trip_id}: {err}");
                return self.send(ServerEvent::error("Failed to send message")).await;
            }
        }

        let saved = match self.state.data_manager.post_message(trip_id, &self.user, text).await {
            Ok(saved) => saved,
            Err(DataManagerError::InvalidInput(reason)) => return self.send(ServerEvent::error(reason)).await,
            Err(err) => {
                tracing::warn!("Failed to store message for trip {trip_id}: {err}");
                return self.send(ServerEvent::error("Failed to send message")).await;
            }
        };

        let broadcast = ChatBroadcast {
            id: saved.id,
            trip_id,
            message: saved.message,
            user: ChatUser::from(&self.user),
            time: saved.created_at,
        };
        self.state
            .chat_rooms
            .publish(trip_id, RoomEvent::to_all(self.connection_id, ServerEvent::ReceiveMessage(broadcast)))
            .await;
    }

    /// Waits while the socket is behind. Fails only once the writer is gone.
    async fn send(&self, event: ServerEvent) {
        let _ = self.outbox.send(event).await;
    }
}

async fn forward(
    mut receiver: broadcast::Receiver<RoomEvent>,
    connection_id: u64,
    trip_id: i64,
    outbox: mpsc::Sender<ServerEvent>,
) {
    loop {
        match receiver.recv().await {
            Ok(room_event) => {
                // Waits on a full outbox. The room buffer then overflows and this receiver lags.
                if room_event.is_visible_to(connection_id) && outbox.send(room_event.event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Connection {connection_id} fell behind in trip {trip_id}, skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use carpool_data_management::DataManager;
    use carpool_lib::{trip::NewTrip, user::NewUser};
    use chrono::NaiveDate;
    use tokio::time::timeout;

    use crate::config::Config;

    use super::*;

    async fn state(room_capacity: usize) -> Arc<ServerState> {
        let config = Config::from_lookup(|key: &str| match key {
            "JWT_SECRET_KEY" => Some("secret".to_string()),
            "FOOTBALL_DATA_API_URL" => Some("http://127.0.0.1:9".to_string()),
            "CHAT_ROOM_CAPACITY" => Some(room_capacity.to_string()),
            _ => None,
        }).unwrap();
        let data_manager = DataManager::in_memory().await.unwrap();
        Arc::new(ServerState::new(&config, data_manager).unwrap())
    }

    async fn user(state: &ServerState, first_name: &str) -> User {
        state.data_manager.register_user(NewUser {
            first_name: first_name.to_string(),
            last_name: "Bernard".to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            password_hash: "hash".to_string(),
            id_favourite_team: None,
        }).await.unwrap()
    }

    fn session(state: &Arc<ServerState>, user: &User) -> (ChatSession, mpsc::Receiver<ServerEvent>) {
        let (outbox, queue) = mpsc::channel(state.chat_rooms.capacity());
        (ChatSession::new(state.clone(), user.clone(), outbox), queue)
    }

    async fn next(queue: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(1), queue.recv()).await.unwrap().unwrap()
    }

    async fn setup() -> (Arc<ServerState>, User, User, User, i64) {
        setup_with_capacity(100).await
    }

    async fn setup_with_capacity(room_capacity: usize) -> (Arc<ServerState>, User, User, User, i64) {
        let state = state(room_capacity).await;
        let driver = user(&state, "Lucas").await;
        let passenger = user(&state, "Emma").await;
        let outsider = user(&state, "Jules").await;

        let departure = NaiveDate::from_ymd_opt(2025, 5, 17).and_then(|date| date.and_hms_opt(18, 0, 0)).unwrap();
        let trip = state.data_manager.create_trip(driver.id, NewTrip {
            match_id: 497410,
            departure_time: departure,
            departure_location: "Marseille Saint-Charles".to_string(),
            arrival_location: "Orange Vélodrome".to_string(),
            available_seats: 3,
            price: 4.5,
        }).await.unwrap();
        state.data_manager.join_trip(trip.id, passenger.id, 1).await.unwrap();

        (state, driver, passenger, outsider, trip.id)
    }

    #[tokio::test]
    async fn members_see_joins_and_messages() {
        let (state, driver, passenger, _, trip_id) = setup().await;
        let (mut lucas, mut lucas_queue) = session(&state, &driver);
        let (mut emma, mut emma_queue) = session(&state, &passenger);

        lucas.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        assert_eq!(next(&mut lucas_queue).await, ServerEvent::MessageHistory(vec![]));

        emma.handle_frame(&format!(r#"{{"event":"joinTrip","data":{{"tripId":{trip_id}}}}}"#)).await;
        assert_eq!(next(&mut emma_queue).await, ServerEvent::MessageHistory(vec![]));
        assert_eq!(next(&mut lucas_queue).await, ServerEvent::UserJoined("Emma joined the conversation".into()));

        emma.handle_event(ClientEvent::SendMessage { trip_id, message: "  On part à 18h ?  ".into() }).await;

        for queue in [&mut lucas_queue, &mut emma_queue] {
            let ServerEvent::ReceiveMessage(received) = next(queue).await else {
                panic!("expected a relayed message");
            };
            assert_eq!(received.message, "On part à 18h ?");
            assert_eq!(received.user.id, passenger.id);
            assert_eq!(received.trip_id, trip_id);
        }

        let history = state.data_manager.get_messages(trip_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].username, "Emma");
    }

    #[tokio::test]
    async fn rejoining_only_replays_history() {
        let (state, driver, passenger, _, trip_id) = setup().await;
        let (mut lucas, mut lucas_queue) = session(&state, &driver);
        let (mut emma, mut emma_queue) = session(&state, &passenger);

        lucas.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        next(&mut lucas_queue).await;
        emma.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        next(&mut emma_queue).await;
        next(&mut lucas_queue).await;

        emma.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        assert!(matches!(next(&mut emma_queue).await, ServerEvent::MessageHistory(_)));

        lucas.handle_event(ClientEvent::SendMessage { trip_id, message: "Bonjour".into() }).await;
        // No second announcement sits ahead of the message.
        assert!(matches!(next(&mut lucas_queue).await, ServerEvent::ReceiveMessage(_)));
    }

    #[tokio::test]
    async fn outsiders_and_strays_get_errors() {
        let (state, _, _, outsider, trip_id) = setup().await;
        let (mut jules, mut queue) = session(&state, &outsider);

        jules.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        assert_eq!(next(&mut queue).await, ServerEvent::error("You are not part of this trip"));
        assert!(!jules.is_in(trip_id));

        jules.handle_event(ClientEvent::SendMessage { trip_id, message: "Salut".into() }).await;
        assert_eq!(next(&mut queue).await, ServerEvent::error("Join the trip before sending messages"));

        jules.handle_event(ClientEvent::JoinTrip { trip_id: 9999 }).await;
        assert_eq!(next(&mut queue).await, ServerEvent::error("Trip not found"));

        jules.handle_frame("{\"event\":\"dance\"}").await;
        assert_eq!(next(&mut queue).await, ServerEvent::error("Malformed message"));

        assert!(state.data_manager.get_messages(trip_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_messages_are_refused() {
        let (state, driver, _, _, trip_id) = setup().await;
        let (mut lucas, mut queue) = session(&state, &driver);

        lucas.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        next(&mut queue).await;

        lucas.handle_event(ClientEvent::SendMessage { trip_id, message: "   ".into() }).await;
        assert_eq!(next(&mut queue).await, ServerEvent::error("Message is empty"));
        assert!(state.data_manager.get_messages(trip_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn leaving_closes_empty_rooms() {
        let (state, driver, passenger, _, trip_id) = setup().await;
        let (mut lucas, mut lucas_queue) = session(&state, &driver);
        let (mut emma, _emma_queue) = session(&state, &passenger);

        lucas.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        emma.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        assert_eq!(state.chat_rooms.room_count().await, 1);

        // History, then Emma's arrival.
        next(&mut lucas_queue).await;
        next(&mut lucas_queue).await;

        lucas.handle_event(ClientEvent::LeaveTrip { trip_id }).await;
        assert!(!lucas.is_in(trip_id));
        assert_eq!(state.chat_rooms.room_count().await, 1);

        emma.handle_event(ClientEvent::SendMessage { trip_id, message: "Toujours là ?".into() }).await;
        assert!(timeout(Duration::from_millis(50), lucas_queue.recv()).await.is_err());

        emma.leave_all().await;
        assert_eq!(state.chat_rooms.room_count().await, 0);
    }

    #[tokio::test]
    async fn slow_members_lag_instead_of_queueing_everything() {
        let (state, driver, passenger, _, trip_id) = setup_with_capacity(4).await;
        let (mut lucas, mut lucas_queue) = session(&state, &driver);
        let (mut emma, mut emma_queue) = session(&state, &passenger);

        lucas.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        emma.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        next(&mut emma_queue).await;

        // Lucas never reads while Emma talks.
        for i in 0..50 {
            emma.handle_event(ClientEvent::SendMessage { trip_id, message: format!("Message {i}") }).await;
            assert!(matches!(next(&mut emma_queue).await, ServerEvent::ReceiveMessage(_)));
        }
        assert!(lucas_queue.len() <= 4);

        let mut relayed = Vec::new();
        while let Ok(Some(event)) = timeout(Duration::from_millis(100), lucas_queue.recv()).await {
            if let ServerEvent::ReceiveMessage(received) = event {
                relayed.push(received.message);
            }
        }
        assert!(relayed.len() < 50);
        assert_eq!(relayed.last().map(String::as_str), Some("Message 49"));
    }

    #[tokio::test]
    async fn cancelled_passengers_lose_the_room() {
        let (state, _, passenger, _, trip_id) = setup().await;
        let (mut emma, mut queue) = session(&state, &passenger);

        emma.handle_event(ClientEvent::JoinTrip { trip_id }).await;
        next(&mut queue).await;

        state.data_manager.cancel_reservation(trip_id, passenger.id).await.unwrap();

        emma.handle_event(ClientEvent::SendMessage { trip_id, message: "Je viens quand même".into() }).await;
        assert_eq!(next(&mut queue).await, ServerEvent::error("You are not part of this trip"));
        assert!(!emma.is_in(trip_id));
        assert!(state.data_manager.get_messages(trip_id).await.unwrap().is_empty());
        assert_eq!(state.chat_rooms.room_count().await, 0);
    }
}
