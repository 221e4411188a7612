//! Room Actor operations. Every function here locks the room's `Mutex` for
//! the duration of one logical operation — that lock is the entirety of the
//! single serialization point a room's state transitions need, the same
//! guarantee a nested `Room`/`GameState` lock pair would give, just with one
//! lock instead of two.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{Mutex, mpsc};

use zing_core::cards::Card;
use zing_core::engine::{GamePlayer, GameState, RoundSummary};
use zing_core::identity::{PlayerId, Role};
use zing_core::protocol::{
    EventPayload, ReconnectToken, RoundEndTeams, ServerMessage, TeamAssignment, TeamScorePair,
    Visibility,
};

use crate::config::Config;
use crate::error::RoomError;
use crate::repository::MatchResult;

use super::timer::{persist_pending_log, schedule_recap_pause, schedule_talon_pause, schedule_turn_timer};
use super::{Member, PlayerRx, ReconnectRecord, Room, RoomPhase, now_ms};

pub type RoomHandle = Arc<Mutex<Room>>;

// ---------------------------------------------------------------------------
// Membership lifecycle
// ---------------------------------------------------------------------------

pub async fn join(
    room: &RoomHandle,
    player_id: PlayerId,
    name: String,
    requested_role: Role,
) -> Result<PlayerRx, RoomError> {
    let mut guard = room.lock().await;

    if guard.member(&player_id).is_some() {
        if let Some(m) = guard.member_mut(&player_id) {
            m.name = name;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        guard.player_senders.insert(player_id.clone(), tx);
        guard.send_snapshot(&player_id, None);
        return Ok(rx);
    }

    // A game already running admits newcomers only as spectators,
    // regardless of the role they asked for.
    let role = if guard.phase != RoomPhase::Waiting { Role::Spectator } else { requested_role };

    match role {
        Role::Player if guard.player_role_members().count() >= 4 => return Err(RoomError::RoomFull),
        Role::Spectator
            if guard.members.iter().filter(|m| m.role == Role::Spectator).count()
                >= guard.max_spectators =>
        {
            return Err(RoomError::RoomFull);
        }
        _ => {}
    }

    let member = Member { player_id: player_id.clone(), name, role, joined_at_ms: now_ms() };
    guard.members.push(member);
    if guard.host_id.is_none() {
        guard.host_id = Some(player_id.clone());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    guard.player_senders.insert(player_id.clone(), tx);

    let snapshot = guard.room_snapshot();
    guard.emit_membership(
        Some(player_id.clone()),
        EventPayload::RoomUpdate {
            members: snapshot.members.clone(),
            host_id: snapshot.host_id.clone(),
            timer_enabled: snapshot.timer_enabled,
        },
        ServerMessage::RoomUpdate(snapshot),
    );
    guard.send_snapshot(&player_id, None);

    Ok(rx)
}

/// Validates and applies a `rejoin_room` intent.
pub async fn rejoin(
    room: &RoomHandle,
    player_id: &PlayerId,
    token: &str,
    last_seen_seq: Option<u64>,
    reconnect_ttl_ms: u64,
) -> Result<PlayerRx, RoomError> {
    let mut guard = room.lock().await;
    let valid = guard
        .reconnect_tokens
        .get(player_id)
        .map(|record| record.token == token && record.expires_at_ms > now_ms())
        .unwrap_or(false);
    if !valid || guard.member(player_id).is_none() {
        return Err(RoomError::RejoinInvalid);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    guard.player_senders.insert(player_id.clone(), tx);
    guard.send_snapshot(player_id, last_seen_seq);
    issue_reconnect_token(&mut guard, player_id, reconnect_ttl_ms);
    Ok(rx)
}

/// Removes `player_id` from the room. Returns `true` if the room is now
/// empty (caller should remove it from the registry).
pub async fn leave(room: &RoomHandle, player_id: &PlayerId) -> bool {
    let mut guard = room.lock().await;
    if guard.member(player_id).is_none() {
        return guard.members.is_empty();
    }

    guard.members.retain(|m| &m.player_id != player_id);
    guard.player_senders.remove(player_id);

    guard.emit_membership(
        Some(player_id.clone()),
        EventPayload::MemberLeft { player_id: player_id.clone() },
        ServerMessage::MemberLeft { player_id: player_id.clone() },
    );

    if guard.is_host(player_id) {
        guard.host_id = guard.pick_host_successor();
        if let Some(new_host) = guard.host_id.clone() {
            guard.emit_membership(
                None,
                EventPayload::HostChanged { host_id: new_host.clone() },
                ServerMessage::HostChanged { host_id: new_host },
            );
        }
    }

    guard.members.is_empty()
}

pub async fn kick(room: &RoomHandle, caller: &PlayerId, target: &PlayerId) -> Result<(), RoomError> {
    let mut guard = room.lock().await;
    if !guard.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    if caller == target {
        return Err(RoomError::KickSelfForbidden);
    }
    if guard.member(target).is_none() {
        return Ok(());
    }

    guard.send_to_player(target, ServerMessage::YouWereKicked);
    guard.members.retain(|m| &m.player_id != target);
    guard.player_senders.remove(target);

    guard.emit_membership(
        Some(caller.clone()),
        EventPayload::MemberKicked { player_id: target.clone() },
        ServerMessage::MemberKicked { player_id: target.clone() },
    );
    Ok(())
}

pub async fn set_role(
    room: &RoomHandle,
    caller: &PlayerId,
    target: &PlayerId,
    role: Role,
) -> Result<(), RoomError> {
    let mut guard = room.lock().await;
    if !guard.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    if guard.phase != RoomPhase::Waiting {
        return Err(RoomError::GameInProgress);
    }
    if guard.member(target).is_none() {
        return Ok(());
    }

    match role {
        Role::Player if guard.player_role_members().count() >= 4 => return Err(RoomError::RoomFull),
        Role::Spectator
            if guard.members.iter().filter(|m| m.role == Role::Spectator).count()
                >= guard.max_spectators =>
        {
            return Err(RoomError::RoomFull);
        }
        _ => {}
    }

    if let Some(m) = guard.member_mut(target) {
        m.role = role;
    }
    guard.emit_membership(
        Some(caller.clone()),
        EventPayload::RoleChanged { player_id: target.clone(), role },
        ServerMessage::RoleChanged { player_id: target.clone(), role },
    );
    Ok(())
}

pub async fn toggle_timer(room: &RoomHandle, caller: &PlayerId, enabled: bool) -> Result<(), RoomError> {
    let mut guard = room.lock().await;
    if !guard.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    if guard.phase != RoomPhase::Waiting {
        return Err(RoomError::GameInProgress);
    }
    guard.timer_enabled = enabled;
    let snapshot = guard.room_snapshot();
    guard.emit_membership(
        Some(caller.clone()),
        EventPayload::RoomUpdate {
            members: snapshot.members.clone(),
            host_id: snapshot.host_id.clone(),
            timer_enabled: snapshot.timer_enabled,
        },
        ServerMessage::RoomUpdate(snapshot),
    );
    Ok(())
}

pub async fn set_team_assignment(
    room: &RoomHandle,
    caller: &PlayerId,
    team0: [PlayerId; 2],
    team1: [PlayerId; 2],
) -> Result<(), RoomError> {
    let mut guard = room.lock().await;
    if !guard.is_host(caller) {
        return Err(RoomError::NotHost);
    }
    if guard.phase != RoomPhase::Waiting {
        return Err(RoomError::GameInProgress);
    }

    let mut all = vec![team0[0].clone(), team0[1].clone(), team1[0].clone(), team1[1].clone()];
    all.sort();
    all.dedup();
    let all_are_players =
        all.iter().all(|pid| guard.member(pid).map(|m| m.role == Role::Player).unwrap_or(false));
    if all.len() != 4 || !all_are_players {
        return Err(RoomError::InvalidTeamAssignment);
    }

    let assignment = TeamAssignment { team0, team1 };
    guard.team_assignment = Some(assignment.clone());
    guard.broadcast(&ServerMessage::TeamsUpdated { team_assignment: assignment });
    Ok(())
}

// ---------------------------------------------------------------------------
// Start protocols
// ---------------------------------------------------------------------------

pub async fn start_1v1(
    room: &RoomHandle,
    caller: &PlayerId,
    config: &Config,
    repo: &super::Repo,
) -> Result<(), RoomError> {
    {
        let mut guard = room.lock().await;
        if !guard.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        if guard.phase != RoomPhase::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        let ordered: Vec<Member> = guard.player_role_members().cloned().collect();
        if ordered.len() != 2 {
            return Err(RoomError::WrongPlayerCount);
        }
        let team_of: HashMap<PlayerId, u8> =
            ordered.iter().enumerate().map(|(i, m)| (m.player_id.clone(), i as u8)).collect();
        begin_game(&mut guard, ordered, &team_of, 0, config);
    }
    schedule_turn_timer(room.clone(), *config, repo.clone()).await;
    Ok(())
}

/// `2v2_random` is semantically a 2-player game with team tags, so this
/// delegates straight to `start_1v1`.
pub async fn start_2v2_random(
    room: &RoomHandle,
    caller: &PlayerId,
    config: &Config,
    repo: &super::Repo,
) -> Result<(), RoomError> {
    start_1v1(room, caller, config, repo).await
}

pub async fn start_2v2_party(
    room: &RoomHandle,
    caller: &PlayerId,
    config: &Config,
    repo: &super::Repo,
) -> Result<(), RoomError> {
    {
        let mut guard = room.lock().await;
        if !guard.is_host(caller) {
            return Err(RoomError::NotHost);
        }
        if guard.phase != RoomPhase::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        let ordered: Vec<Member> = guard.player_role_members().cloned().collect();
        if ordered.len() != 4 {
            return Err(RoomError::WrongPlayerCount);
        }
        let assignment = guard.team_assignment.clone().ok_or(RoomError::InvalidTeamAssignment)?;

        let mut all: Vec<PlayerId> = ordered.iter().map(|m| m.player_id.clone()).collect();
        all.sort();
        let mut expected: Vec<PlayerId> =
            assignment.team0.iter().chain(assignment.team1.iter()).cloned().collect();
        expected.sort();
        if all != expected {
            return Err(RoomError::InvalidTeamAssignment);
        }

        let mut team_of = HashMap::new();
        for pid in &assignment.team0 {
            team_of.insert(pid.clone(), 0u8);
        }
        for pid in &assignment.team1 {
            team_of.insert(pid.clone(), 1u8);
        }

        begin_game(&mut guard, ordered, &team_of, 0, config);
    }
    schedule_turn_timer(room.clone(), *config, repo.clone()).await;
    Ok(())
}

fn begin_game(
    guard: &mut Room,
    ordered: Vec<Member>,
    team_of: &HashMap<PlayerId, u8>,
    dealer_seat: usize,
    config: &Config,
) {
    let game_players: Vec<GamePlayer> = ordered
        .iter()
        .enumerate()
        .map(|(seat, m)| GamePlayer {
            player_id: m.player_id.clone(),
            name: m.name.clone(),
            seat,
            team: *team_of.get(&m.player_id).unwrap_or(&0),
            hand: Vec::new(),
            taken: Vec::new(),
        })
        .collect();

    let n = ordered.len().max(1);
    let seed = fresh_seed(guard);
    let match_target = guard.match_target_initial;
    let (state, events) = GameState::start_match(game_players, dealer_seat % n, seed, match_target);
    guard.game = Some(state);
    guard.phase = RoomPhase::Playing;
    guard.surrender_votes.clear();
    guard.rematch_votes.clear();

    guard.emit_gameplay(
        None,
        EventPayload::GameStarted { game_id: format!("{}-{}", guard.room_id.0, now_ms()) },
    );

    for member in &ordered {
        if let Some(snapshot) = guard.game_state_snapshot(&member.player_id) {
            guard.send_to_player(&member.player_id, ServerMessage::GameState(snapshot));
        }
    }

    for event in events {
        guard.emit_gameplay(None, event);
    }

    for member in &ordered {
        issue_reconnect_token(guard, &member.player_id, config.reconnect_token_ttl_ms);
    }
}

// ---------------------------------------------------------------------------
// Gameplay intents
// ---------------------------------------------------------------------------

pub async fn play_card(
    room: &RoomHandle,
    player_id: &PlayerId,
    card: Card,
    config: &Config,
    repo: &super::Repo,
) -> Result<Option<MatchResult>, RoomError> {
    let (had_capture, round_ended, match_result) = {
        let mut guard = room.lock().await;
        if guard.phase != RoomPhase::Playing {
            return Err(RoomError::NotYourTurn);
        }
        if guard.paused {
            return Err(RoomError::Paused);
        }
        {
            let off_turn = {
                let game = guard.game.as_ref().ok_or(RoomError::NotYourTurn)?;
                game.current_turn_player() != player_id
            };
            if off_turn {
                if guard.last_expired_player.as_ref() == Some(player_id) {
                    guard.last_expired_player = None;
                    return Err(RoomError::TurnExpired);
                }
                return Err(RoomError::NotYourTurn);
            }
            let game = guard.game.as_ref().unwrap();
            if !game.players.iter().any(|p| &p.player_id == player_id && p.hand.contains(&card)) {
                return Err(RoomError::IllegalCard);
            }
        }
        apply_play(&mut guard, player_id, card)
    };

    if round_ended {
        schedule_recap_pause(room.clone(), *config, repo.clone()).await;
    } else if had_capture {
        schedule_talon_pause(room.clone(), *config, repo.clone()).await;
    } else {
        schedule_turn_timer(room.clone(), *config, repo.clone()).await;
    }

    if let Some(result) = &match_result {
        let repo = repo.clone();
        let result = result.clone();
        tokio::spawn(async move { repo.record_match_result(result).await });
    }

    Ok(match_result)
}

/// Dev-only impersonation intent, gated per-room by the room's `dev_mode`
/// flag, set at creation from [`Config::dev_mode_enabled`].
pub async fn play_card_as(
    room: &RoomHandle,
    caller: &PlayerId,
    card: Card,
    as_player_id: &PlayerId,
    config: &Config,
    repo: &super::Repo,
) -> Result<Option<MatchResult>, RoomError> {
    let _ = caller;
    {
        let guard = room.lock().await;
        if !guard.dev_mode {
            return Err(RoomError::Internal);
        }
    }
    play_card(room, as_player_id, card, config, repo).await
}

/// Applies a validated play and resolves whatever follows (capture
/// bookkeeping, dealing, round/match end). Shared by the caller-initiated
/// `play_card` path and the turn-timer's forced-leftmost-card path, both of
/// which have already decided `player_id`/`card` are legal to submit now.
pub(super) fn apply_play(
    guard: &mut Room,
    player_id: &PlayerId,
    card: Card,
) -> (bool, bool, Option<MatchResult>) {
    let outcome = guard
        .game
        .as_mut()
        .expect("active game")
        .play_card(player_id, card)
        .expect("card validated by the caller before apply_play");

    guard.generation.fetch_add(1, Ordering::SeqCst);

    let had_capture = outcome.events.iter().any(|e| matches!(e, EventPayload::TalonTaken { .. }));
    for event in outcome.events {
        guard.emit_gameplay(Some(player_id.clone()), event);
    }

    let round_ended = outcome.round_end.is_some();
    let match_result = outcome.round_end.and_then(|summary| finish_round(guard, summary));

    (had_capture, round_ended, match_result)
}

fn finish_round(guard: &mut Room, summary: RoundSummary) -> Option<MatchResult> {
    let points = summary.round_points();
    {
        let game = guard.game.as_mut().expect("round just ended implies active game");
        game.scores.add(0, points.team0);
        game.scores.add(1, points.team1);
    }

    let (team0_score, team1_score, target) = {
        let game = guard.game.as_ref().unwrap();
        (game.scores.team0, game.scores.team1, game.match_target)
    };
    let scores_pair = TeamScorePair { team0: team0_score, team1: team1_score };

    guard.emit_gameplay(
        None,
        EventPayload::RoundEnd {
            scores: scores_pair.clone(),
            teams: RoundEndTeams { team0: summary.team0, team1: summary.team1 },
            bonus: summary.bonus,
        },
    );
    guard.emit_gameplay(None, EventPayload::ScoresUpdated { team0: team0_score, team1: team1_score });

    let team0_over = team0_score >= target;
    let team1_over = team1_score >= target;

    if team0_over && team1_over {
        let step = guard.match_target_step;
        guard.game.as_mut().unwrap().match_target += step;
        start_next_round(guard);
        None
    } else if team0_over || team1_over {
        let winner_team = if team0_over { 0 } else { 1 };
        Some(conclude_match(guard, winner_team, scores_pair))
    } else {
        start_next_round(guard);
        None
    }
}

fn start_next_round(guard: &mut Room) {
    let seed = fresh_seed(guard);
    let events = guard.game.as_mut().expect("active game").start_new_round(seed);
    for event in events {
        guard.emit_gameplay(None, event);
    }
}

fn conclude_match(guard: &mut Room, winner_team: u8, final_scores: TeamScorePair) -> MatchResult {
    guard.phase = RoomPhase::Postgame;
    guard.emit_gameplay(None, EventPayload::MatchEnd { winner_team, final_scores: final_scores.clone() });
    let player_ids = guard
        .game
        .as_ref()
        .map(|g| g.players.iter().map(|p| p.player_id.clone()).collect())
        .unwrap_or_default();
    MatchResult { room_id: guard.room_id.clone(), winner_team, final_scores, player_ids }
}

/// Deterministic, dependency-free reshuffle seed: an FNV-1a-style mix of the
/// room id, wall clock, and current generation counter. Avoids depending on
/// a global RNG entry point; reproducibility only needs a seed, not
/// unpredictability of the seed itself.
fn fresh_seed(guard: &Room) -> u64 {
    let hash =
        guard.room_id.0.bytes().fold(1469598103u64, |acc, b| (acc ^ b as u64).wrapping_mul(1099511628211));
    now_ms() ^ hash ^ guard.generation.load(Ordering::SeqCst)
}

// ---------------------------------------------------------------------------
// Surrender, rematch, exit
// ---------------------------------------------------------------------------

pub async fn vote_surrender(
    room: &RoomHandle,
    player_id: &PlayerId,
    repo: &super::Repo,
) -> Result<Option<MatchResult>, RoomError> {
    let mut guard = room.lock().await;
    if guard.phase != RoomPhase::Playing {
        return Err(RoomError::NotYourTurn);
    }
    if guard.member(player_id).map(|m| m.role) != Some(Role::Player) {
        return Err(RoomError::NotYourTurn);
    }

    guard.surrender_votes.insert(player_id.clone());
    guard.broadcast(&ServerMessage::SurrenderVoteAdded { player_id: player_id.clone() });

    let Some(team) = guard
        .game
        .as_ref()
        .and_then(|g| g.players.iter().find(|p| &p.player_id == player_id).map(|p| p.team))
    else {
        return Ok(None);
    };

    let team_members: Vec<PlayerId> = guard
        .game
        .as_ref()
        .unwrap()
        .players
        .iter()
        .filter(|p| p.team == team)
        .map(|p| p.player_id.clone())
        .collect();
    if !team_members.iter().all(|pid| guard.surrender_votes.contains(pid)) {
        return Ok(None);
    }

    let winner_team = 1 - team;
    guard.broadcast(&ServerMessage::TeamSurrendered { team });
    let final_scores = guard
        .game
        .as_ref()
        .map(|g| TeamScorePair { team0: g.scores.team0, team1: g.scores.team1 })
        .unwrap_or(TeamScorePair { team0: 0, team1: 0 });
    let result = conclude_match(&mut guard, winner_team, final_scores);
    persist_pending_log(&mut guard, repo);
    Ok(Some(result))
}

pub async fn vote_rematch(
    room: &RoomHandle,
    player_id: &PlayerId,
    config: &Config,
    repo: &super::Repo,
) -> Result<(), RoomError> {
    let start_info = {
        let mut guard = room.lock().await;
        if guard.phase != RoomPhase::Postgame {
            return Err(RoomError::NotYourTurn);
        }
        guard.rematch_votes.insert(player_id.clone());
        guard.broadcast(&ServerMessage::RematchVoteAdded { player_id: player_id.clone() });

        let all_players: Vec<Member> = guard.player_role_members().cloned().collect();
        let all_voted =
            !all_players.is_empty() && all_players.iter().all(|m| guard.rematch_votes.contains(&m.player_id));
        if !all_voted {
            None
        } else {
            let previous_team_of: HashMap<PlayerId, u8> = guard
                .game
                .as_ref()
                .map(|g| g.players.iter().map(|p| (p.player_id.clone(), p.team)).collect())
                .unwrap_or_default();
            let previous_dealer = guard.game.as_ref().map(|g| g.dealer_seat).unwrap_or(0);
            Some((all_players, previous_team_of, previous_dealer))
        }
    };

    if let Some((ordered, team_of, previous_dealer)) = start_info {
        let n = ordered.len().max(1);
        let next_dealer = (previous_dealer + 1) % n;
        {
            let mut guard = room.lock().await;
            begin_game(&mut guard, ordered, &team_of, next_dealer, config);
            guard.broadcast(&ServerMessage::RematchStarted);
        }
        schedule_turn_timer(room.clone(), *config, repo.clone()).await;
    }
    Ok(())
}

/// Leaves a finished match. Returns `true` if the room is now empty.
pub async fn exit_game(room: &RoomHandle, player_id: &PlayerId) -> bool {
    let mut guard = room.lock().await;
    match guard.visibility {
        Visibility::Matchmaking => {
            guard.broadcast_except(&ServerMessage::GameExited { returned_to_room_id: None }, player_id);
            guard.send_to_player(player_id, ServerMessage::GameExited { returned_to_room_id: None });
            guard.members.retain(|m| &m.player_id != player_id);
            guard.player_senders.remove(player_id);
            guard.members.is_empty()
        }
        Visibility::Private => {
            guard.phase = RoomPhase::Waiting;
            guard.game = None;
            guard.surrender_votes.clear();
            guard.rematch_votes.clear();
            let room_id = guard.room_id.clone();
            guard.send_to_player(player_id, ServerMessage::StayedInRoom { room_id });
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Reconnection
// ---------------------------------------------------------------------------

pub(super) fn issue_reconnect_token(guard: &mut Room, player_id: &PlayerId, ttl_ms: u64) {
    let raw = format!("{}-{}-{}", player_id, now_ms(), guard.generation.load(Ordering::SeqCst));
    let token = format!("{:x}", fnv1a(&raw));
    guard.reconnect_tokens.insert(
        player_id.clone(),
        ReconnectRecord { token: token.clone(), expires_at_ms: now_ms() + ttl_ms },
    );
    let room_id = guard.room_id.clone();
    guard.send_to_player(player_id, ServerMessage::ReconnectToken { room_id, token: ReconnectToken(token) });
}

/// Not a cryptographic token — matches the pack's in-process, non-adversarial
/// trust model (reconnect tokens are bearer secrets over an already-trusted
/// transport, not authentication credentials).
fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(1469598103u64, |acc, b| (acc ^ b as u64).wrapping_mul(1099511628211))
}

#[cfg(test)]
mod tests {
    use zing_core::engine::TeamTotals;
    use zing_core::protocol::{InviteToken, RoomCode, RoomId, TeamRoundSummary};

    use super::*;
    use crate::repository::InMemoryRepository;

    async fn two_player_room() -> RoomHandle {
        let room = Room::new(
            RoomId("room-test".into()),
            Some(RoomCode("ABC123".into())),
            InviteToken("invite-test".into()),
            Visibility::Private,
            false,
            101,
            50,
            8,
        );
        let handle: RoomHandle = Arc::new(Mutex::new(room));
        let config = Config::default();
        let repo: super::super::Repo = Arc::new(InMemoryRepository::default());
        join(&handle, PlayerId::from("p1"), "Alice".into(), Role::Player).await.unwrap();
        join(&handle, PlayerId::from("p2"), "Bob".into(), Role::Player).await.unwrap();
        start_1v1(&handle, &PlayerId::from("p1"), &config, &repo).await.unwrap();
        handle
    }

    fn team_summary(total_points: u32) -> TeamRoundSummary {
        TeamRoundSummary { scoring_cards: Vec::new(), zings: 0, total_taken: 0, total_points, players: Vec::new() }
    }

    #[tokio::test]
    async fn starting_a_game_deals_hands_and_issues_reconnect_tokens() {
        let room = two_player_room().await;
        let guard = room.lock().await;
        assert_eq!(guard.phase, RoomPhase::Playing);
        assert!(guard.game.is_some());
        assert!(guard.reconnect_tokens.contains_key(&PlayerId::from("p1")));
        assert!(guard.reconnect_tokens.contains_key(&PlayerId::from("p2")));
    }

    #[tokio::test]
    async fn starting_1v1_with_the_wrong_player_count_is_rejected() {
        let room = Arc::new(Mutex::new(Room::new(
            RoomId("room-solo".into()),
            Some(RoomCode("SOLO01".into())),
            InviteToken("invite-solo".into()),
            Visibility::Private,
            false,
            101,
            50,
            8,
        )));
        join(&room, PlayerId::from("p1"), "Alice".into(), Role::Player).await.unwrap();
        let config = Config::default();
        let repo: super::super::Repo = Arc::new(InMemoryRepository::default());
        let err = start_1v1(&room, &PlayerId::from("p1"), &config, &repo).await.unwrap_err();
        assert_eq!(err, RoomError::WrongPlayerCount);
    }

    #[tokio::test]
    async fn playing_out_of_turn_is_rejected() {
        let room = two_player_room().await;
        let config = Config::default();
        let repo: super::super::Repo = Arc::new(InMemoryRepository::default());
        let (off_turn_player, off_turn_card) = {
            let guard = room.lock().await;
            let game = guard.game.as_ref().unwrap();
            let current = game.current_turn_player().clone();
            let other = game.players.iter().find(|p| p.player_id != current).unwrap();
            (other.player_id.clone(), other.hand[0])
        };
        let err = play_card(&room, &off_turn_player, off_turn_card, &config, &repo).await.unwrap_err();
        assert_eq!(err, RoomError::NotYourTurn);
    }

    /// A reconnecting player receives a fresh `game_state` snapshot and
    /// the event-log tail since their last-seen seq, and is issued a new
    /// reconnect token.
    #[tokio::test]
    async fn reconnect_replays_snapshot_and_rotates_the_token() {
        let room = two_player_room().await;
        let (p1, old_token) = {
            let guard = room.lock().await;
            let p1 = guard.members[0].player_id.clone();
            let token = guard.reconnect_tokens.get(&p1).unwrap().token.clone();
            (p1, token)
        };

        let mut rx = rejoin(&room, &p1, &old_token, Some(0), 600_000).await.unwrap();
        let mut saw_game_state = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(msg, ServerMessage::GameState(_)) {
                saw_game_state = true;
            }
        }
        assert!(saw_game_state);

        let new_token = room.lock().await.reconnect_tokens.get(&p1).unwrap().token.clone();
        assert_ne!(new_token, old_token);
    }

    #[tokio::test]
    async fn reconnect_with_a_stale_token_is_rejected() {
        let room = two_player_room().await;
        let p1 = room.lock().await.members[0].player_id.clone();
        let err = rejoin(&room, &p1, "not-the-real-token", None, 600_000).await.unwrap_err();
        assert_eq!(err, RoomError::RejoinInvalid);
    }

    /// When both teams end a round at or above the current target, the
    /// target is raised by the configured step and play continues instead
    /// of ending the match.
    #[tokio::test]
    async fn both_teams_over_target_extends_it_instead_of_ending_the_match() {
        let room = two_player_room().await;
        let mut guard = room.lock().await;
        guard.game.as_mut().unwrap().match_target = 101;
        guard.game.as_mut().unwrap().scores = TeamTotals::default();

        let summary = RoundSummary { team0: team_summary(104), team1: team_summary(103), bonus: None };
        let result = finish_round(&mut guard, summary);

        assert!(result.is_none());
        assert_eq!(guard.game.as_ref().unwrap().match_target, 151);
        assert_eq!(guard.phase, RoomPhase::Playing);
    }

    #[tokio::test]
    async fn one_team_over_target_ends_the_match() {
        let room = two_player_room().await;
        let mut guard = room.lock().await;
        guard.game.as_mut().unwrap().match_target = 101;
        guard.game.as_mut().unwrap().scores = TeamTotals::default();

        let summary = RoundSummary { team0: team_summary(110), team1: team_summary(40), bonus: None };
        let result = finish_round(&mut guard, summary);

        let match_result = result.expect("team0 crossed the target");
        assert_eq!(match_result.winner_team, 0);
        assert_eq!(guard.phase, RoomPhase::Postgame);
    }

    #[tokio::test]
    async fn kicking_yourself_is_forbidden() {
        let room = two_player_room().await;
        let err = kick(&room, &PlayerId::from("p1"), &PlayerId::from("p1")).await.unwrap_err();
        assert_eq!(err, RoomError::KickSelfForbidden);
    }

    #[tokio::test]
    async fn only_the_host_can_kick() {
        let room = two_player_room().await;
        let err = kick(&room, &PlayerId::from("p2"), &PlayerId::from("p1")).await.unwrap_err();
        assert_eq!(err, RoomError::NotHost);
    }

    #[tokio::test]
    async fn leaving_host_transfers_to_the_earliest_remaining_member() {
        let room = two_player_room().await;
        leave(&room, &PlayerId::from("p1")).await;
        assert_eq!(room.lock().await.host_id, Some(PlayerId::from("p2")));
    }
}
