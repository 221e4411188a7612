//! Connection Registry (component B): the process-wide `PlayerId -> RoomId`
//! attachment map. Everything else about a "session" (its outbound sender,
//! its websocket task) is owned by the [`crate::room::Room`] it's attached
//! to, the same way `Room::player_senders` owns per-connection state — this
//! registry exists only because players here move between rooms
//! (matchmaking, invites) over a connection's lifetime, and something has
//! to know where they currently are.

use std::collections::HashMap;

use tokio::sync::RwLock;

use zing_core::identity::PlayerId;
use zing_core::protocol::RoomId;

#[derive(Default)]
pub struct ConnectionRegistry {
    attachments: RwLock<HashMap<PlayerId, RoomId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `player_id` to `room_id`, returning whatever room it was
    /// previously attached to (if any and if different).
    pub async fn attach(&self, player_id: PlayerId, room_id: RoomId) -> Option<RoomId> {
        let mut map = self.attachments.write().await;
        let previous = map.insert(player_id, room_id.clone());
        previous.filter(|prev| prev != &room_id)
    }

    pub async fn detach(&self, player_id: &PlayerId) {
        self.attachments.write().await.remove(player_id);
    }

    pub async fn room_of(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.attachments.read().await.get(player_id).cloned()
    }
}
