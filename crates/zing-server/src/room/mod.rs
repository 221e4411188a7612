//! Room data model and the per-player outbound channel plumbing
//! (`PlayerTx`/`PlayerRx`, `send_to_player`/`broadcast`/`broadcast_except`).
//!
//! A single [`tokio::sync::Mutex<Room>`] is the whole serialization
//! boundary — `GameState` lives directly inside `Room` rather than behind
//! its own nested lock, since the outer lock already gives a "one operation
//! at a time for a given room" guarantee.

pub mod actor;
pub mod timer;

pub use actor::RoomHandle;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

/// Shared handle to the match-result/event-log/friend/credential
/// collaborator, held as a trait object since the concrete
/// backing store is swappable (in-memory test double vs. a real one).
pub type Repo = Arc<dyn crate::repository::MatchRepository>;

use zing_core::engine::GameState;
use zing_core::identity::{PlayerId, Role};
use zing_core::protocol::{
    GameEvent, GameStateSnapshot, InviteToken, MemberInfo, PlayerPublicView, RoomCode, RoomId,
    RoomSnapshot, ServerMessage, TeamAssignment, Visibility,
};

/// Handle to a per-player outbound channel; the websocket write task drains
/// the matching [`PlayerRx`] and forwards frames.
pub type PlayerTx = mpsc::UnboundedSender<ServerMessage>;
pub type PlayerRx = mpsc::UnboundedReceiver<ServerMessage>;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

#[derive(Debug, Clone)]
pub struct Member {
    pub player_id: PlayerId,
    pub name: String,
    pub role: Role,
    pub joined_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Waiting,
    Playing,
    Postgame,
}

#[derive(Debug, Clone)]
pub struct ReconnectRecord {
    pub token: String,
    pub expires_at_ms: u64,
}

/// One active room: membership, an optional active [`GameState`], the
/// append-only event log, and per-player outbound senders.
pub struct Room {
    pub room_id: RoomId,
    pub code: Option<RoomCode>,
    pub invite_token: InviteToken,
    pub visibility: Visibility,
    pub dev_mode: bool,

    pub members: Vec<Member>,
    pub host_id: Option<PlayerId>,
    pub timer_enabled: bool,
    pub team_assignment: Option<TeamAssignment>,

    pub phase: RoomPhase,
    pub game: Option<GameState>,
    pub match_target_initial: u32,
    pub match_target_step: u32,

    pub event_log: Vec<GameEvent>,
    /// Gameplay events appended since the last drain, awaiting opportunistic
    /// persistence via [`crate::repository::MatchRepository::append_event_log`].
    pub pending_log: Vec<GameEvent>,
    pub player_senders: HashMap<PlayerId, PlayerTx>,
    pub reconnect_tokens: HashMap<PlayerId, ReconnectRecord>,

    pub surrender_votes: std::collections::HashSet<PlayerId>,
    pub rematch_votes: std::collections::HashSet<PlayerId>,

    /// Bumped on every new turn, talon pause, and recap pause so
    /// previously-spawned timer tasks (see `room::timer`) can recognize
    /// they've been superseded and no-op.
    pub generation: Arc<AtomicU64>,
    /// Set while a talon or recap pause is in effect; intents are rejected
    /// with `paused` and timer starts are deferred until it clears.
    pub paused: bool,
    /// The player whose turn was just forced by an expired timer, if any.
    /// A late `play_card` from this player is rejected with `turn_expired`
    /// rather than `not_your_turn`; cleared once consumed or once their
    /// next real turn starts.
    pub last_expired_player: Option<PlayerId>,

    pub max_spectators: usize,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        code: Option<RoomCode>,
        invite_token: InviteToken,
        visibility: Visibility,
        dev_mode: bool,
        match_target_initial: u32,
        match_target_step: u32,
        max_spectators: usize,
    ) -> Self {
        Room {
            room_id,
            code,
            invite_token,
            visibility,
            dev_mode,
            members: Vec::new(),
            host_id: None,
            timer_enabled: true,
            team_assignment: None,
            phase: RoomPhase::Waiting,
            game: None,
            match_target_initial,
            match_target_step,
            event_log: Vec::new(),
            pending_log: Vec::new(),
            player_senders: HashMap::new(),
            reconnect_tokens: HashMap::new(),
            surrender_votes: std::collections::HashSet::new(),
            rematch_votes: std::collections::HashSet::new(),
            generation: Arc::new(AtomicU64::new(0)),
            paused: false,
            last_expired_player: None,
            max_spectators,
        }
    }

    pub fn send_to_player(&self, player_id: &PlayerId, msg: ServerMessage) {
        if let Some(tx) = self.player_senders.get(player_id) {
            let _ = tx.send(msg);
        }
    }

    pub fn broadcast(&self, msg: &ServerMessage) {
        for tx in self.player_senders.values() {
            let _ = tx.send(msg.clone());
        }
    }

    pub fn broadcast_except(&self, msg: &ServerMessage, exclude: &PlayerId) {
        for (pid, tx) in &self.player_senders {
            if pid != exclude {
                let _ = tx.send(msg.clone());
            }
        }
    }

    pub fn member(&self, player_id: &PlayerId) -> Option<&Member> {
        self.members.iter().find(|m| &m.player_id == player_id)
    }

    pub fn member_mut(&mut self, player_id: &PlayerId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.player_id == player_id)
    }

    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        self.host_id.as_ref() == Some(player_id)
    }

    pub fn player_role_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.role == Role::Player)
    }

    /// Picks a deterministic successor when the host leaves: earliest-joined
    /// remaining `player`, else earliest-joined spectator.
    pub fn pick_host_successor(&self) -> Option<PlayerId> {
        self.player_role_members()
            .min_by_key(|m| m.joined_at_ms)
            .or_else(|| self.members.iter().min_by_key(|m| m.joined_at_ms))
            .map(|m| m.player_id.clone())
    }

    /// Appends `payload` to the event log with the next `seq` and returns
    /// the stamped event, ready to broadcast.
    pub fn push_event(
        &mut self,
        actor: Option<PlayerId>,
        payload: zing_core::protocol::EventPayload,
    ) -> GameEvent {
        let seq = self.event_log.last().map(|e| e.seq + 1).unwrap_or(1);
        let event = GameEvent { seq, actor, payload };
        self.event_log.push(event.clone());
        event
    }

    pub fn broadcast_event(&self, event: &GameEvent) {
        self.broadcast(&ServerMessage::GameEvent(event.clone()));
    }

    /// Gameplay events (`card_played`, `talon_taken`, `round_end`, ...)
    /// have no dedicated flat `ServerMessage` variant — they're only ever
    /// delivered wrapped in `game_event`, live or on reconnect replay.
    pub fn emit_gameplay(
        &mut self,
        actor: Option<PlayerId>,
        payload: zing_core::protocol::EventPayload,
    ) {
        let event = self.push_event(actor, payload);
        self.broadcast_event(&event);
        self.pending_log.push(event);
    }

    /// Takes every gameplay event appended since the last call, for the
    /// caller to hand off to [`crate::repository::MatchRepository::append_event_log`].
    pub fn drain_pending_log(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_log)
    }

    /// Membership/lobby events (`room_update`, `host_changed`, ...) are
    /// pushed live as their own flat `ServerMessage` variant; they're also
    /// recorded to the event log so a reconnecting player's tail replay
    /// (delivered as `game_event`) stays consistent.
    pub fn emit_membership(
        &mut self,
        actor: Option<PlayerId>,
        payload: zing_core::protocol::EventPayload,
        live: ServerMessage,
    ) {
        self.push_event(actor, payload);
        self.broadcast(&live);
    }

    pub fn room_snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            code: self.code.clone(),
            visibility: self.visibility,
            members: self
                .members
                .iter()
                .map(|m| MemberInfo {
                    player_id: m.player_id.clone(),
                    name: m.name.clone(),
                    role: m.role,
                    joined_at_ms: m.joined_at_ms,
                })
                .collect(),
            host_id: self.host_id.clone(),
            timer_enabled: self.timer_enabled,
            team_assignment: self.team_assignment.clone(),
        }
    }

    /// Per-recipient snapshot: `your_hand` is only populated for `viewer`'s
    /// own seat.
    pub fn game_state_snapshot(&self, viewer: &PlayerId) -> Option<GameStateSnapshot> {
        let game = self.game.as_ref()?;
        let players = game
            .players
            .iter()
            .map(|p| PlayerPublicView {
                player_id: p.player_id.clone(),
                name: p.name.clone(),
                seat: p.seat,
                team: p.team,
                hand_count: p.hand.len(),
                taken_count: p.taken.len(),
            })
            .collect();
        let your_hand = game
            .players
            .iter()
            .find(|p| &p.player_id == viewer)
            .map(|p| p.hand.clone());
        Some(GameStateSnapshot {
            hand_number: game.hand_number,
            dealer_seat: game.dealer_seat,
            current_turn_player_id: game.current_turn_player().clone(),
            players,
            your_hand,
            talon: game.talon.clone(),
            scores: zing_core::protocol::TeamScorePair {
                team0: game.scores.team0,
                team1: game.scores.team1,
            },
            round_zings: zing_core::protocol::TeamScorePair {
                team0: game.round_zings.team0,
                team1: game.round_zings.team1,
            },
            match_target: game.match_target,
            last_seq: self.event_log.last().map(|e| e.seq).unwrap_or(0),
        })
    }

    /// Sends a freshly subscribed/rejoined session its `room_update`, and
    /// (if a game is active) its `game_state` plus the event-log tail
    /// beyond `last_seen_seq`.
    pub fn send_snapshot(&self, player_id: &PlayerId, last_seen_seq: Option<u64>) {
        self.send_to_player(player_id, ServerMessage::RoomUpdate(self.room_snapshot()));
        if let Some(state) = self.game_state_snapshot(player_id) {
            self.send_to_player(player_id, ServerMessage::GameState(state));
        }
        let since = last_seen_seq.unwrap_or(0);
        for event in self.event_log.iter().filter(|e| e.seq > since) {
            self.send_to_player(player_id, ServerMessage::GameEvent(event.clone()));
        }
    }
}
