//! Turn timer and visual pause coordination: bump a generation counter,
//! spawn a sleeping task that re-checks the counter on wake, and treat a
//! mismatch as "superseded, no-op".

use std::sync::atomic::Ordering;
use std::time::Duration;

use zing_core::protocol::EventPayload;

use crate::config::Config;

use super::actor::{RoomHandle, apply_play};
use super::{Repo, Room, RoomPhase, now_ms};

/// Hands every gameplay event appended since the last drain off to the
/// repository for opportunistic, fire-and-forget persistence.
pub(super) fn persist_pending_log(guard: &mut Room, repo: &Repo) {
    let events = guard.drain_pending_log();
    if events.is_empty() {
        return;
    }
    let repo = repo.clone();
    let room_id = guard.room_id.clone();
    tokio::spawn(async move {
        for event in events {
            repo.append_event_log(&room_id, &event).await;
        }
    });
}

pub async fn schedule_turn_timer(room: RoomHandle, config: Config, repo: Repo) {
    let generation = {
        let mut guard = room.lock().await;
        persist_pending_log(&mut guard, &repo);
        if !(guard.timer_enabled && guard.phase == RoomPhase::Playing && guard.game.is_some()) {
            return;
        }
        let gen = guard.generation.fetch_add(1, Ordering::SeqCst) + 1;
        guard.paused = false;
        if let Some(game) = &guard.game {
            let player_id = game.current_turn_player().clone();
            if guard.last_expired_player.as_ref() == Some(&player_id) {
                guard.last_expired_player = None;
            }
            let expires_at_ms = now_ms() + config.turn_duration_ms;
            guard.emit_gameplay(
                None,
                EventPayload::TurnTimerStarted { player_id, duration_ms: config.turn_duration_ms, expires_at_ms },
            );
        }
        gen
    };

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(config.turn_duration_ms)).await;
        force_expired_play(room, config, repo, generation).await;
    });
}

/// Defers the next turn timer by `talon_pause_ms` after a capture, so
/// clients have time to animate the talon being swept.
pub async fn schedule_talon_pause(room: RoomHandle, config: Config, repo: Repo) {
    let generation = {
        let mut guard = room.lock().await;
        persist_pending_log(&mut guard, &repo);
        guard.paused = true;
        guard.generation.fetch_add(1, Ordering::SeqCst) + 1
    };

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(config.talon_pause_ms)).await;
        let still_current = {
            let mut guard = room.lock().await;
            if guard.generation.load(Ordering::SeqCst) != generation {
                false
            } else {
                guard.paused = false;
                guard.phase == RoomPhase::Playing
            }
        };
        if still_current {
            schedule_turn_timer(room, config, repo).await;
        }
    });
}

/// Suppresses any pending turn timer for `recap_pause_ms` after a round
/// ends, so clients have time to show the round recap.
pub async fn schedule_recap_pause(room: RoomHandle, config: Config, repo: Repo) {
    let generation = {
        let mut guard = room.lock().await;
        persist_pending_log(&mut guard, &repo);
        guard.paused = true;
        guard.generation.fetch_add(1, Ordering::SeqCst) + 1
    };

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(config.recap_pause_ms)).await;
        let still_playing = {
            let mut guard = room.lock().await;
            if guard.generation.load(Ordering::SeqCst) != generation {
                false
            } else {
                guard.paused = false;
                guard.phase == RoomPhase::Playing
            }
        };
        if still_playing {
            schedule_turn_timer(room, config, repo).await;
        }
    });
}

/// Forces the current turn player's leftmost card into play once their
/// timer expires. No-ops if superseded by a newer generation (a real play,
/// another pause, or the room winding down).
async fn force_expired_play(room: RoomHandle, config: Config, repo: Repo, generation: u64) {
    let outcome = {
        let mut guard = room.lock().await;
        if guard.generation.load(Ordering::SeqCst) != generation || guard.paused {
            return;
        }
        if guard.phase != RoomPhase::Playing {
            return;
        }
        let Some(game) = &guard.game else { return };
        let player_id = game.current_turn_player().clone();
        let Some(card) = game.players.iter().find(|p| p.player_id == player_id).and_then(|p| p.hand.first().copied())
        else {
            return;
        };
        guard.last_expired_player = Some(player_id.clone());
        apply_play(&mut guard, &player_id, card)
    };

    let (had_capture, round_ended, match_result) = outcome;

    if round_ended {
        schedule_recap_pause(room, config, repo.clone()).await;
    } else if had_capture {
        schedule_talon_pause(room, config, repo.clone()).await;
    } else {
        schedule_turn_timer(room, config, repo.clone()).await;
    }

    if let Some(result) = match_result {
        tokio::spawn(async move { repo.record_match_result(result).await });
    }
}
