//! Wire protocol: the closed set of client→server and server→client
//! messages, plus the event/event-log shapes.
//!
//! Every message type is a fixed-shape enum variant tagged by `"type"` —
//! no `any`/dynamic payloads, matching the Design Notes' "tagged variants"
//! guidance. Unknown fields are ignored and required-field misses become
//! a typed deserialize error, which Axum/serde_json give us for free.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::identity::{PlayerId, Role};

macro_rules! wire_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_string())
            }
        }
    };
}

wire_id!(RoomId);
wire_id!(RoomCode);
wire_id!(InviteToken);
wire_id!(ReconnectToken);
wire_id!(InviteId);

/// Whether a room was opened privately or produced by matchmaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Matchmaking,
}

/// Matchmaking modes; also used by the `2v2_party` start protocol to tag
/// explicit team membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchmakingMode {
    #[serde(rename = "1v1")]
    OneVOne,
    #[serde(rename = "2v2")]
    TwoVTwo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAssignment {
    pub team0: [PlayerId; 2],
    pub team1: [PlayerId; 2],
}

/// A member of a room's waiting/playing roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub player_id: PlayerId,
    pub name: String,
    pub role: Role,
    pub joined_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Game event payloads — the append-only Event Log entries.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZingInfo {
    pub points: u32,
    pub double: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusReason {
    MostCards,
    TieTwoClubs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonus {
    pub reason: BonusReason,
    pub awarded_to_team: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoundSummary {
    pub scoring_cards: Vec<Card>,
    pub zings: u32,
    pub total_taken: usize,
    pub total_points: u32,
    pub players: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEndTeams {
    pub team0: TeamRoundSummary,
    pub team1: TeamRoundSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScorePair {
    pub team0: u32,
    pub team1: u32,
}

/// One entry in a room's append-only [`EventLog`](crate::protocol). Carries
/// the monotonically increasing `seq` and the optional acting player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub seq: u64,
    pub actor: Option<PlayerId>,
    pub payload: EventPayload,
}

/// The closed set of event shapes a Room Actor may append to its
/// [`GameEvent`] log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    GameStarted {
        game_id: String,
    },
    HandsDealt {
        hand_number: u32,
        dealt: std::collections::BTreeMap<PlayerId, Vec<Card>>,
    },
    CardPlayed {
        player_id: PlayerId,
        card: Card,
    },
    TalonTaken {
        player_id: PlayerId,
        taken: Vec<Card>,
        zing: Option<ZingInfo>,
    },
    TalonAwarded {
        player_id: PlayerId,
        taken: Vec<Card>,
    },
    RoundEnd {
        scores: TeamScorePair,
        teams: RoundEndTeams,
        bonus: Option<Bonus>,
    },
    ScoresUpdated {
        team0: u32,
        team1: u32,
    },
    MatchEnd {
        winner_team: u8,
        final_scores: TeamScorePair,
    },
    TurnTimerStarted {
        player_id: PlayerId,
        duration_ms: u64,
        expires_at_ms: u64,
    },
    RoomUpdate {
        members: Vec<MemberInfo>,
        host_id: Option<PlayerId>,
        timer_enabled: bool,
    },
    HostChanged {
        host_id: PlayerId,
    },
    RoleChanged {
        player_id: PlayerId,
        role: Role,
    },
    MemberKicked {
        player_id: PlayerId,
    },
    MemberLeft {
        player_id: PlayerId,
    },
    YouWereKicked,
}

// ---------------------------------------------------------------------------
// Client → server messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        token: Option<String>,
        guest_id: Option<String>,
        name: String,
        role: Option<Role>,
    },
    CreatePrivateRoom {
        name: String,
    },
    JoinRoom {
        room_id: Option<RoomId>,
        code: Option<RoomCode>,
        invite_token: Option<InviteToken>,
        guest_id: String,
        name: String,
    },
    RejoinRoom {
        room_id: RoomId,
        player_id: PlayerId,
        reconnect_token: ReconnectToken,
    },
    LeaveRoomMember {
        room_id: RoomId,
    },
    KickMember {
        room_id: RoomId,
        target_user_id: PlayerId,
    },
    SetMemberRole {
        room_id: RoomId,
        target_user_id: PlayerId,
        role: Role,
    },
    ToggleTimer {
        room_id: RoomId,
        enabled: bool,
    },
    SetTeamAssignment {
        room_id: RoomId,
        team0: [PlayerId; 2],
        team1: [PlayerId; 2],
    },
    #[serde(rename = "start_1v1")]
    Start1v1 {
        room_id: RoomId,
    },
    #[serde(rename = "start_2v2_random")]
    Start2v2Random {
        room_id: RoomId,
    },
    #[serde(rename = "start_2v2_party")]
    Start2v2Party {
        room_id: RoomId,
    },
    IntentPlayCard {
        room_id: RoomId,
        card_id: Card,
    },
    IntentPlayCardAs {
        room_id: RoomId,
        card_id: Card,
        as_player_id: PlayerId,
    },
    VoteSurrender {
        room_id: RoomId,
    },
    VoteRematch {
        room_id: RoomId,
    },
    ExitGame {
        room_id: RoomId,
    },
    FindGame {
        mode: MatchmakingMode,
    },
    CancelFindGame,
    SendInvite {
        friend_id: PlayerId,
    },
    AcceptInvite {
        invite_id: InviteId,
    },
    DeclineInvite {
        invite_id: InviteId,
    },
    GetPendingInvites,
}

// ---------------------------------------------------------------------------
// Server → client messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchmakingCancelReason {
    PartnerDisconnected,
    UserCancelled,
}

/// Machine-readable failure codes, paired with a human-readable `message`
/// field on every error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    AuthInvalid,
    NotYourTurn,
    IllegalCard,
    Paused,
    TurnExpired,
    NotHost,
    KickSelfForbidden,
    RoomNotFound,
    CodeMismatch,
    InviteExpired,
    InviteNotFound,
    NotFriends,
    GameInProgress,
    AlreadyStarted,
    RoomFull,
    WrongPlayerCount,
    InvalidTeamAssignment,
    RejoinInvalid,
    ServerError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub code: Option<RoomCode>,
    pub visibility: Visibility,
    pub members: Vec<MemberInfo>,
    pub host_id: Option<PlayerId>,
    pub timer_enabled: bool,
    pub team_assignment: Option<TeamAssignment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPublicView {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub team: u8,
    pub hand_count: usize,
    pub taken_count: usize,
}

/// A per-recipient snapshot of the active game: `your_hand` is only
/// populated for the recipient's own seat, never another player's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub hand_number: u32,
    pub dealer_seat: usize,
    pub current_turn_player_id: PlayerId,
    pub players: Vec<PlayerPublicView>,
    pub your_hand: Option<Vec<Card>>,
    pub talon: Vec<Card>,
    pub scores: TeamScorePair,
    pub round_zings: TeamScorePair,
    pub match_target: u32,
    pub last_seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthOk {
        id: PlayerId,
        name: String,
        role: Role,
    },
    RoomCreated {
        room_id: RoomId,
        code: RoomCode,
        invite_token: InviteToken,
    },
    RoomUpdate(RoomSnapshot),
    RoomLeft,
    YouWereKicked,
    HostChanged {
        host_id: PlayerId,
    },
    RoleChanged {
        player_id: PlayerId,
        role: Role,
    },
    MemberKicked {
        player_id: PlayerId,
    },
    MemberLeft {
        player_id: PlayerId,
    },
    TeamsUpdated {
        team_assignment: TeamAssignment,
    },
    QueueJoined {
        mode: MatchmakingMode,
    },
    QueueLeft,
    MatchFound {
        room_id: RoomId,
        mode: MatchmakingMode,
        players: Vec<PlayerId>,
    },
    InviteSent {
        invite_id: InviteId,
    },
    InviteReceived {
        invite_id: InviteId,
        inviter_id: PlayerId,
        room_id: RoomId,
    },
    InviteAccepted {
        invite_id: InviteId,
    },
    InviteDeclined {
        invite_id: InviteId,
    },
    InviteCancelled {
        invite_id: InviteId,
        reason: String,
    },
    PendingInvites {
        invites: Vec<InviteId>,
    },
    ReconnectToken {
        room_id: RoomId,
        token: ReconnectToken,
    },
    RejoinError {
        reason: ErrorReason,
        message: String,
    },
    JoinError {
        reason: ErrorReason,
        message: String,
    },
    RoomError {
        reason: ErrorReason,
        message: String,
    },
    InviteError {
        reason: ErrorReason,
        message: String,
    },
    TeamError {
        reason: ErrorReason,
        message: String,
    },
    StartError {
        reason: ErrorReason,
        message: String,
    },
    MatchmakingError {
        reason: MatchmakingCancelReason,
        message: String,
    },
    GameState(GameStateSnapshot),
    GameEvent(GameEvent),
    GameExited {
        returned_to_room_id: Option<RoomId>,
    },
    SurrenderVoteAdded {
        player_id: PlayerId,
    },
    TeamSurrendered {
        team: u8,
    },
    RematchVoteAdded {
        player_id: PlayerId,
    },
    RematchStarted,
    ReturnedToRoom {
        room_id: RoomId,
    },
    StayedInRoom {
        room_id: RoomId,
    },
    UserOnline {
        player_id: PlayerId,
    },
    UserOffline {
        player_id: PlayerId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_tags_match_spec_wire_vocabulary() {
        let cases = [
            (r#"{"type":"auth","token":null,"guest_id":"g1","name":"A","role":null}"#, "Auth"),
            (r#"{"type":"start_1v1","room_id":"r1"}"#, "Start1v1"),
            (r#"{"type":"start_2v2_random","room_id":"r1"}"#, "Start2v2Random"),
            (r#"{"type":"start_2v2_party","room_id":"r1"}"#, "Start2v2Party"),
            (r#"{"type":"cancel_find_game"}"#, "CancelFindGame"),
            (r#"{"type":"get_pending_invites"}"#, "GetPendingInvites"),
        ];
        for (json, expected) in cases {
            let msg: ClientMessage = serde_json::from_str(json).unwrap();
            let tag = format!("{msg:?}");
            assert!(tag.starts_with(expected), "{tag} did not start with {expected}");
        }
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"type":"cancel_find_game","bogus_extra":123}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::CancelFindGame));
    }

    #[test]
    fn missing_required_field_is_a_typed_error() {
        let json = r#"{"type":"kick_member","room_id":"r1"}"#;
        let err = serde_json::from_str::<ClientMessage>(json).unwrap_err();
        assert!(err.to_string().contains("target_user_id"));
    }
}
