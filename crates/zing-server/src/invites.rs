//! Invite Store: tracks outstanding friend-to-room invitations, their TTL,
//! and their accept/decline/expire lifecycle. Lazily sweeps expired entries
//! on every read — "check on access, no background reaper" — rather than
//! running a timer task for state this short-lived.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use zing_core::identity::PlayerId;
use zing_core::protocol::{InviteId, RoomId};

use crate::room::now_ms;

#[derive(Debug, Clone)]
pub struct Invite {
    pub invite_id: InviteId,
    pub inviter_id: PlayerId,
    pub invitee_id: PlayerId,
    pub room_id: RoomId,
    pub expires_at_ms: u64,
}

#[derive(Default)]
pub struct InviteStore {
    invites: RwLock<HashMap<InviteId, Invite>>,
    counter: AtomicU64,
}

impl InviteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn send_invite(
        &self,
        inviter_id: PlayerId,
        invitee_id: PlayerId,
        room_id: RoomId,
        ttl_ms: u64,
    ) -> Invite {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let invite_id = InviteId(format!("invite-{}-{n:x}", now_ms()));
        let invite = Invite { invite_id, inviter_id, invitee_id, room_id, expires_at_ms: now_ms() + ttl_ms };
        self.invites.write().await.insert(invite.invite_id.clone(), invite.clone());
        invite
    }

    async fn sweep_expired(&self) {
        let now = now_ms();
        self.invites.write().await.retain(|_, invite| invite.expires_at_ms > now);
    }

    pub async fn accept_invite(&self, invite_id: &InviteId, accepting_player: &PlayerId) -> Option<Invite> {
        self.sweep_expired().await;
        let mut invites = self.invites.write().await;
        let invite = invites.get(invite_id)?;
        if &invite.invitee_id != accepting_player {
            return None;
        }
        invites.remove(invite_id)
    }

    pub async fn decline_invite(&self, invite_id: &InviteId, declining_player: &PlayerId) -> Option<Invite> {
        self.sweep_expired().await;
        let mut invites = self.invites.write().await;
        let invite = invites.get(invite_id)?;
        if &invite.invitee_id != declining_player {
            return None;
        }
        invites.remove(invite_id)
    }

    pub async fn pending_invites_for(&self, player_id: &PlayerId) -> Vec<Invite> {
        self.sweep_expired().await;
        self.invites.read().await.values().filter(|i| &i.invitee_id == player_id).cloned().collect()
    }

    /// Cancels every outstanding invite pointing at `room_id`, returning
    /// them so the caller can notify each invitee with `invite_cancelled`
    /// (`reason: "room_deleted"`).
    pub async fn cancel_invites_for_room(&self, room_id: &RoomId) -> Vec<Invite> {
        let mut invites = self.invites.write().await;
        let cancelled: Vec<Invite> =
            invites.values().filter(|i| &i.room_id == room_id).cloned().collect();
        for invite in &cancelled {
            invites.remove(&invite.invite_id);
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId(s.to_string())
    }

    #[tokio::test]
    async fn only_the_invitee_can_accept_or_decline() {
        let store = InviteStore::new();
        let invite = store.send_invite(pid("host"), pid("friend"), RoomId("r1".into()), 60_000).await;

        assert!(store.accept_invite(&invite.invite_id, &pid("someone_else")).await.is_none());
        assert!(store.accept_invite(&invite.invite_id, &pid("friend")).await.is_some());
    }

    #[tokio::test]
    async fn accepted_invite_is_removed_from_the_pending_list() {
        let store = InviteStore::new();
        let invite = store.send_invite(pid("host"), pid("friend"), RoomId("r1".into()), 60_000).await;
        store.accept_invite(&invite.invite_id, &pid("friend")).await;
        assert!(store.pending_invites_for(&pid("friend")).await.is_empty());
    }

    #[tokio::test]
    async fn expired_invites_are_swept_on_read() {
        let store = InviteStore::new();
        let invite = store.send_invite(pid("host"), pid("friend"), RoomId("r1".into()), 0).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(store.pending_invites_for(&pid("friend")).await.is_empty());
        assert!(store.accept_invite(&invite.invite_id, &pid("friend")).await.is_none());
    }

    #[tokio::test]
    async fn cancel_invites_for_room_only_touches_that_room() {
        let store = InviteStore::new();
        let r1 = RoomId("r1".into());
        let r2 = RoomId("r2".into());
        store.send_invite(pid("host"), pid("friend"), r1.clone(), 60_000).await;
        store.send_invite(pid("host"), pid("other"), r2.clone(), 60_000).await;

        let cancelled = store.cancel_invites_for_room(&r1).await;
        assert_eq!(cancelled.len(), 1);
        assert_eq!(store.pending_invites_for(&pid("other")).await.len(), 1);
    }
}
