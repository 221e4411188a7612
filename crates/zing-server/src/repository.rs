//! Persistence boundary: match results, event-log append, friend lists, and
//! credential lookups, narrowed to a single repository interface so the
//! core never blocks gameplay on a slow or failing backing store.
//!
//! An `#[async_trait] pub trait ...: Send + Sync` object-safe boundary,
//! the same shape used for storage boundaries elsewhere in realtime game
//! servers.

use async_trait::async_trait;

use zing_core::identity::PlayerId;
use zing_core::protocol::{GameEvent, RoomId, TeamScorePair};

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub room_id: RoomId,
    pub winner_team: u8,
    pub final_scores: TeamScorePair,
    pub player_ids: Vec<PlayerId>,
}

/// Narrow interface to the relational persistence layer and the auth/friend
/// HTTP collaborators. Implementations may fail; the core never blocks
/// gameplay on them.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn record_match_result(&self, result: MatchResult);
    async fn append_event_log(&self, room_id: &RoomId, event: &GameEvent);
    async fn load_friend_list(&self, player_id: &PlayerId) -> Vec<PlayerId>;
    async fn validate_credential(&self, token: &str) -> Option<PlayerId>;
}

/// Default repository: no backing store. Every write is logged and
/// swallowed; every read returns an empty/`None` result. Lets the server
/// run standalone for development and integration tests without a database.
pub struct NullRepository;

#[async_trait]
impl MatchRepository for NullRepository {
    async fn record_match_result(&self, result: MatchResult) {
        tracing::warn!(room_id = %result.room_id, "no repository configured, dropping match result");
    }

    async fn append_event_log(&self, room_id: &RoomId, event: &GameEvent) {
        tracing::debug!(room_id = %room_id, seq = event.seq, "no repository configured, dropping event log append");
    }

    async fn load_friend_list(&self, _player_id: &PlayerId) -> Vec<PlayerId> {
        Vec::new()
    }

    async fn validate_credential(&self, _token: &str) -> Option<PlayerId> {
        None
    }
}

/// In-memory test double: actually records what it's given, for assertions
/// in integration tests.
#[derive(Default)]
pub struct InMemoryRepository {
    pub match_results: tokio::sync::Mutex<Vec<MatchResult>>,
    pub event_logs: tokio::sync::Mutex<Vec<(RoomId, GameEvent)>>,
    pub friends: std::collections::HashMap<PlayerId, Vec<PlayerId>>,
    pub credentials: std::collections::HashMap<String, PlayerId>,
}

#[async_trait]
impl MatchRepository for InMemoryRepository {
    async fn record_match_result(&self, result: MatchResult) {
        self.match_results.lock().await.push(result);
    }

    async fn append_event_log(&self, room_id: &RoomId, event: &GameEvent) {
        self.event_logs.lock().await.push((room_id.clone(), event.clone()));
    }

    async fn load_friend_list(&self, player_id: &PlayerId) -> Vec<PlayerId> {
        self.friends.get(player_id).cloned().unwrap_or_default()
    }

    async fn validate_credential(&self, token: &str) -> Option<PlayerId> {
        self.credentials.get(token).cloned()
    }
}
