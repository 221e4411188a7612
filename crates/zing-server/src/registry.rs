//! Room Registry (component C): the process-wide `RoomId -> Room` table,
//! plus the two lookup indices rooms are addressed by on the wire (join
//! code, invite token). A `RwLock<HashMap<...>>` of `Arc<Mutex<Room>>`,
//! generalized with a by-code and by-invite-token index a single-table
//! game server never needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};

use zing_core::protocol::{InviteToken, RoomCode, RoomId, Visibility};

use crate::config::Config;
use crate::room::{Room, RoomHandle};

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_LEN: usize = 6;

#[derive(Default)]
pub struct RoomRegistry {
    by_id: RwLock<HashMap<RoomId, RoomHandle>>,
    by_code: RwLock<HashMap<RoomCode, RoomId>>,
    by_invite_token: RwLock<HashMap<InviteToken, RoomId>>,
    counter: AtomicU64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_token(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{}-{n:x}", crate::room::now_ms())
    }

    /// Generates a `CODE_LEN`-character base36 join code, retrying on the
    /// (astronomically unlikely but checked anyway) collision with an
    /// already-issued code.
    async fn fresh_code(&self) -> RoomCode {
        loop {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) ^ crate::room::now_ms();
            let mut value = n;
            let mut chars = Vec::with_capacity(CODE_LEN);
            for _ in 0..CODE_LEN {
                let idx = (value % CODE_ALPHABET.len() as u64) as usize;
                chars.push(CODE_ALPHABET[idx]);
                value /= CODE_ALPHABET.len() as u64;
            }
            let code = RoomCode(String::from_utf8(chars).expect("alphabet is ASCII"));
            if !self.by_code.read().await.contains_key(&code) {
                return code;
            }
        }
    }

    pub async fn create_room(&self, visibility: Visibility, config: &Config) -> RoomHandle {
        let room_id = RoomId(self.fresh_token("room"));
        let invite_token = InviteToken(self.fresh_token("invite"));
        let code = match visibility {
            Visibility::Private => Some(self.fresh_code().await),
            Visibility::Matchmaking => None,
        };

        let room = Room::new(
            room_id.clone(),
            code.clone(),
            invite_token.clone(),
            visibility,
            config.dev_mode_enabled,
            config.match_target_initial,
            config.match_target_step,
            config.max_spectators_per_room,
        );
        let handle: RoomHandle = Arc::new(Mutex::new(room));

        self.by_id.write().await.insert(room_id.clone(), handle.clone());
        if let Some(code) = &code {
            self.by_code.write().await.insert(code.clone(), room_id.clone());
        }
        self.by_invite_token.write().await.insert(invite_token, room_id);

        handle
    }

    pub async fn get_room_by_id(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.by_id.read().await.get(room_id).cloned()
    }

    /// Codes are case-insensitive on the wire; the generator only ever
    /// issues uppercase ones, so lookups normalize to match.
    pub async fn get_room_by_code(&self, code: &RoomCode) -> Option<RoomHandle> {
        let normalized = RoomCode(code.0.to_uppercase());
        let room_id = self.by_code.read().await.get(&normalized).cloned()?;
        self.get_room_by_id(&room_id).await
    }

    pub async fn get_room_by_invite_token(&self, token: &InviteToken) -> Option<RoomHandle> {
        let room_id = self.by_invite_token.read().await.get(token).cloned()?;
        self.get_room_by_id(&room_id).await
    }

    /// Removes a room and reclaims its code/invite-token indices so a
    /// destroyed room's code becomes available for reuse.
    pub async fn remove_room(&self, room_id: &RoomId) {
        let Some(handle) = self.by_id.write().await.remove(room_id) else { return };
        let guard = handle.lock().await;
        if let Some(code) = &guard.code {
            self.by_code.write().await.remove(code);
        }
        self.by_invite_token.write().await.remove(&guard.invite_token);
    }

    /// Removes `room_id` only if its room is now empty of members — called
    /// after a `leave`/`kick`/matchmaking-exit reports the room drained.
    pub async fn remove_if_empty(&self, room_id: &RoomId) {
        if let Some(handle) = self.get_room_by_id(room_id).await
            && handle.lock().await.members.is_empty()
        {
            self.remove_room(room_id).await;
        }
    }

    pub async fn list_room_ids(&self) -> Vec<RoomId> {
        self.by_id.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn private_rooms_get_a_code_matchmaking_rooms_do_not() {
        let registry = RoomRegistry::new();
        let config = Config::default();

        let private = registry.create_room(Visibility::Private, &config).await;
        assert!(private.lock().await.code.is_some());

        let matched = registry.create_room(Visibility::Matchmaking, &config).await;
        assert!(matched.lock().await.code.is_none());
    }

    #[tokio::test]
    async fn rooms_are_addressable_by_id_code_and_invite_token() {
        let registry = RoomRegistry::new();
        let config = Config::default();
        let room = registry.create_room(Visibility::Private, &config).await;
        let (room_id, code, invite_token) = {
            let guard = room.lock().await;
            (guard.room_id.clone(), guard.code.clone().unwrap(), guard.invite_token.clone())
        };

        assert!(registry.get_room_by_id(&room_id).await.is_some());
        assert!(registry.get_room_by_code(&code).await.is_some());
        assert!(registry.get_room_by_invite_token(&invite_token).await.is_some());
    }

    #[tokio::test]
    async fn removing_a_room_reclaims_its_code_and_invite_token() {
        let registry = RoomRegistry::new();
        let config = Config::default();
        let room = registry.create_room(Visibility::Private, &config).await;
        let (room_id, code, invite_token) = {
            let guard = room.lock().await;
            (guard.room_id.clone(), guard.code.clone().unwrap(), guard.invite_token.clone())
        };

        registry.remove_room(&room_id).await;

        assert!(registry.get_room_by_id(&room_id).await.is_none());
        assert!(registry.get_room_by_code(&code).await.is_none());
        assert!(registry.get_room_by_invite_token(&invite_token).await.is_none());
    }

    #[tokio::test]
    async fn remove_if_empty_only_removes_empty_rooms() {
        let registry = RoomRegistry::new();
        let config = Config::default();
        let room = registry.create_room(Visibility::Private, &config).await;
        let room_id = room.lock().await.room_id.clone();

        room.lock().await.members.push(crate::room::Member {
            player_id: zing_core::identity::PlayerId("p1".into()),
            name: "Alice".into(),
            role: zing_core::identity::Role::Player,
            joined_at_ms: 0,
        });
        registry.remove_if_empty(&room_id).await;
        assert!(registry.get_room_by_id(&room_id).await.is_some());

        room.lock().await.members.clear();
        registry.remove_if_empty(&room_id).await;
        assert!(registry.get_room_by_id(&room_id).await.is_none());
    }
}
