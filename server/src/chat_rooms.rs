use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use carpool_lib::chat::ServerEvent;
use tokio::sync::{broadcast, Mutex};

/// An event published to a trip room, tagged with the connection that caused it.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub origin: u64,
    pub event: ServerEvent,
    pub exclude_origin: bool,
}

impl RoomEvent {
    pub fn to_all(origin: u64, event: ServerEvent) -> Self {
        Self { origin, event, exclude_origin: false }
    }

    pub fn to_others(origin: u64, event: ServerEvent) -> Self {
        Self { origin, event, exclude_origin: true }
    }

    pub fn is_visible_to(&self, connection_id: u64) -> bool {
        !(self.exclude_origin && self.origin == connection_id)
    }
}

/// One broadcast channel per trip with at least one listener.
pub struct ChatRooms {
    rooms: Mutex<HashMap<i64, broadcast::Sender<RoomEvent>>>,
    capacity: usize,
    next_connection_id: AtomicU64,
}

impl ChatRooms {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            capacity,
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn subscribe(&self, trip_id: i64) -> broadcast::Receiver<RoomEvent> {
        let mut rooms = self.rooms.lock().await;
        match rooms.get(&trip_id) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                rooms.insert(trip_id, sender);
                tracing::debug!("Opened chat room for trip {trip_id}");
                receiver
            }
        }
    }

    /// Returns how many listeners the event reached.
    pub async fn publish(&self, trip_id: i64, event: RoomEvent) -> usize {
        let rooms = self.rooms.lock().await;
        rooms
            .get(&trip_id)
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0)
    }

    /// Drops the room once nobody listens to it. Call after the receiver is gone.
    pub async fn release(&self, trip_id: i64) {
        let mut rooms = self.rooms.lock().await;
        if rooms.get(&trip_id).is_some_and(|sender| sender.receiver_count() == 0) {
            rooms.remove(&trip_id);
            tracing::debug!("Closed chat room for trip {trip_id}");
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rooms_live_while_someone_listens() {
        let rooms = ChatRooms::new(8);
        let first = rooms.subscribe(1).await;
        let second = rooms.subscribe(1).await;
        let _other_trip = rooms.subscribe(2).await;
        assert_eq!(rooms.room_count().await, 2);

        drop(first);
        rooms.release(1).await;
        assert_eq!(rooms.room_count().await, 2);

        drop(second);
        rooms.release(1).await;
        assert_eq!(rooms.room_count().await, 1);
    }

    #[tokio::test]
    async fn publishing_reaches_only_that_room() {
        let rooms = ChatRooms::new(8);
        let mut lyon = rooms.subscribe(1).await;
        let mut paris = rooms.subscribe(2).await;

        let reached = rooms.publish(1, RoomEvent::to_all(7, ServerEvent::UserJoined("Camille joined the conversation".into()))).await;
        assert_eq!(reached, 1);

        let received = lyon.recv().await.unwrap();
        assert_eq!(received.event, ServerEvent::UserJoined("Camille joined the conversation".into()));
        assert!(paris.try_recv().is_err());

        assert_eq!(rooms.publish(3, RoomEvent::to_all(7, ServerEvent::error("nobody"))).await, 0);
    }

    #[test]
    fn origin_can_be_excluded() {
        let event = RoomEvent::to_others(3, ServerEvent::UserJoined("Hugo joined the conversation".into()));
        assert!(!event.is_visible_to(3));
        assert!(event.is_visible_to(4));
        assert!(RoomEvent::to_all(3, ServerEvent::error("x")).is_visible_to(3));
    }

    #[test]
    fn connection_ids_are_unique() {
        let rooms = ChatRooms::new(8);
        assert_ne!(rooms.next_connection_id(), rooms.next_connection_id());
    }
}
