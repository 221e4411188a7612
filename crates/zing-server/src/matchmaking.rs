//! Matchmaking Queues: one FIFO per mode. Cohort formation and room creation
//! happen atomically under the queue's lock, so there is no window between
//! "cohort selected" and "room created" where a queued player could vanish —
//! see DESIGN.md for the resulting simplification of the
//! disconnect-before-delivery case.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use zing_core::identity::{PlayerId, Role};
use zing_core::protocol::{MatchmakingMode, Visibility};

use crate::config::Config;
use crate::registry::RoomRegistry;
use crate::room::actor;
use crate::room::{Repo, RoomHandle};

#[derive(Debug, Clone)]
struct Waiting {
    player_id: PlayerId,
    name: String,
}

#[derive(Default)]
pub struct MatchmakingQueues {
    one_v_one: Mutex<VecDeque<Waiting>>,
    two_v_two: Mutex<VecDeque<Waiting>>,
}

/// What the caller (ws_handler) must do after a successful `find_game`:
/// either the player is now queued, or a cohort just completed and a room
/// is ready to join/start.
pub enum FindGameOutcome {
    Queued,
    MatchFound { room: RoomHandle, players: Vec<PlayerId> },
}

impl MatchmakingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_for(&self, mode: MatchmakingMode) -> &Mutex<VecDeque<Waiting>> {
        match mode {
            MatchmakingMode::OneVOne => &self.one_v_one,
            MatchmakingMode::TwoVTwo => &self.two_v_two,
        }
    }

    pub async fn find_game(
        &self,
        player_id: PlayerId,
        name: String,
        mode: MatchmakingMode,
        registry: &RoomRegistry,
        config: &Config,
        repo: &Repo,
    ) -> FindGameOutcome {
        let required = match mode {
            MatchmakingMode::OneVOne => 2,
            MatchmakingMode::TwoVTwo => 4,
        };

        let cohort = {
            let mut queue = self.queue_for(mode).lock().await;
            if queue.iter().any(|w| w.player_id == player_id) {
                return FindGameOutcome::Queued;
            }
            queue.push_back(Waiting { player_id, name });
            if queue.len() < required {
                return FindGameOutcome::Queued;
            }
            queue.drain(..required).collect::<Vec<_>>()
        };

        let room = registry.create_room(Visibility::Matchmaking, config).await;
        let players: Vec<PlayerId> = cohort.iter().map(|w| w.player_id.clone()).collect();

        for waiting in &cohort {
            // `join`'s own receiver is discarded here; ws_handler re-attaches
            // the caller's real receiver when it processes `MatchFound` for
            // whichever of these players is *this* connection.
            let _ = actor::join(&room, waiting.player_id.clone(), waiting.name.clone(), Role::Player).await;
        }

        let host = players[0].clone();
        match mode {
            MatchmakingMode::OneVOne => {
                let _ = actor::start_1v1(&room, &host, config, repo).await;
            }
            MatchmakingMode::TwoVTwo => {
                let team0 = [players[0].clone(), players[2].clone()];
                let team1 = [players[1].clone(), players[3].clone()];
                let _ = actor::set_team_assignment(&room, &host, team0, team1).await;
                let _ = actor::start_2v2_party(&room, &host, config, repo).await;
            }
        }

        FindGameOutcome::MatchFound { room, players }
    }

    pub async fn cancel_find_game(&self, player_id: &PlayerId) {
        for queue in [&self.one_v_one, &self.two_v_two] {
            queue.lock().await.retain(|w| &w.player_id != player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repository::InMemoryRepository;

    fn pid(s: &str) -> PlayerId {
        PlayerId(s.to_string())
    }

    #[tokio::test]
    async fn one_v_one_queues_until_a_second_player_arrives() {
        let queues = MatchmakingQueues::new();
        let registry = RoomRegistry::new();
        let config = Config::default();
        let repo: Repo = Arc::new(InMemoryRepository::default());

        let first = queues
            .find_game(pid("alice"), "Alice".into(), MatchmakingMode::OneVOne, &registry, &config, &repo)
            .await;
        assert!(matches!(first, FindGameOutcome::Queued));

        let second = queues
            .find_game(pid("bob"), "Bob".into(), MatchmakingMode::OneVOne, &registry, &config, &repo)
            .await;
        match second {
            FindGameOutcome::MatchFound { room, players } => {
                assert_eq!(players, vec![pid("alice"), pid("bob")]);
                let guard = room.lock().await;
                assert_eq!(guard.phase, crate::room::RoomPhase::Playing);
            }
            FindGameOutcome::Queued => panic!("expected a match once two players queued"),
        }
    }

    #[tokio::test]
    async fn two_v_two_assigns_alternating_teams() {
        let queues = MatchmakingQueues::new();
        let registry = RoomRegistry::new();
        let config = Config::default();
        let repo: Repo = Arc::new(InMemoryRepository::default());

        for name in ["p0", "p1", "p2"] {
            let outcome = queues
                .find_game(pid(name), name.into(), MatchmakingMode::TwoVTwo, &registry, &config, &repo)
                .await;
            assert!(matches!(outcome, FindGameOutcome::Queued));
        }

        let outcome = queues
            .find_game(pid("p3"), "p3".into(), MatchmakingMode::TwoVTwo, &registry, &config, &repo)
            .await;
        let FindGameOutcome::MatchFound { room, players } = outcome else {
            panic!("expected a match once four players queued");
        };
        assert_eq!(players, vec![pid("p0"), pid("p1"), pid("p2"), pid("p3")]);

        let guard = room.lock().await;
        let assignment = guard.team_assignment.clone().unwrap();
        assert_eq!(assignment.team0, [pid("p0"), pid("p2")]);
        assert_eq!(assignment.team1, [pid("p1"), pid("p3")]);
    }

    #[tokio::test]
    async fn cancel_find_game_removes_the_player_from_every_queue() {
        let queues = MatchmakingQueues::new();
        let registry = RoomRegistry::new();
        let config = Config::default();
        let repo: Repo = Arc::new(InMemoryRepository::default());

        queues
            .find_game(pid("alice"), "Alice".into(), MatchmakingMode::OneVOne, &registry, &config, &repo)
            .await;
        queues.cancel_find_game(&pid("alice")).await;

        let outcome = queues
            .find_game(pid("bob"), "Bob".into(), MatchmakingMode::OneVOne, &registry, &config, &repo)
            .await;
        assert!(matches!(outcome, FindGameOutcome::Queued));
    }
}
