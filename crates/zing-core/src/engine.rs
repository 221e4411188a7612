//! Game Engine (component E): deterministic dealing, capture, zing, and
//! round-scoring rules for Zing.
//!
//! The engine does not know about rooms, sessions, or the wire protocol —
//! it owns a [`GameState`] and exposes methods that mutate it and return the
//! [`EventPayload`]s produced, a "mutate in place, return the events" idiom.
//! The Room Actor is the only caller and is the sole owner of the mutable
//! reference, so no internal locking is needed here.
//!
//! Determinism: every method that consumes randomness takes an explicit
//! `u64` seed rather than reaching for a global RNG.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::cards::Card;
use crate::error::EngineError;
use crate::identity::PlayerId;
use crate::protocol::{Bonus, BonusReason, EventPayload, TeamRoundSummary, ZingInfo};

/// Cumulative per-team totals carried across a match (scores) or reset each
/// round (zings).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TeamTotals {
    pub team0: u32,
    pub team1: u32,
}

impl TeamTotals {
    pub fn get(&self, team: u8) -> u32 {
        if team == 0 { self.team0 } else { self.team1 }
    }

    pub fn add(&mut self, team: u8, amount: u32) {
        if team == 0 {
            self.team0 += amount;
        } else {
            self.team1 += amount;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingZing {
    pub card: Card,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone)]
pub struct GamePlayer {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub team: u8,
    pub hand: Vec<Card>,
    pub taken: Vec<Card>,
}

/// Server-side state of one active game, owned exclusively by its Room
/// Actor. `scores` and `match_target` are `pub` because the actor mutates
/// them directly after each round — the engine computes what a round was
/// worth, the actor decides what that means for the match.
#[derive(Debug, Clone)]
pub struct GameState {
    pub players: Vec<GamePlayer>,
    pub deck: Vec<Card>,
    pub talon: Vec<Card>,
    pub dealer_seat: usize,
    pub current_turn_index: usize,
    pub hand_number: u32,
    pub scores: TeamTotals,
    pub round_zings: TeamTotals,
    pub pending_zing: Option<PendingZing>,
    pub last_capturer: Option<PlayerId>,
    pub match_target: u32,
}

/// Result of a single [`GameState::play_card`] call.
#[derive(Debug, Clone, Default)]
pub struct PlayCardOutcome {
    pub events: Vec<EventPayload>,
    pub round_end: Option<RoundSummary>,
}

/// What a completed round was worth, computed by the engine and handed to
/// the Room Actor to fold into cumulative match state.
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub team0: TeamRoundSummary,
    pub team1: TeamRoundSummary,
    pub bonus: Option<Bonus>,
}

impl RoundSummary {
    pub fn round_points(&self) -> TeamTotals {
        TeamTotals {
            team0: self.team0.total_points,
            team1: self.team1.total_points,
        }
    }
}

impl GameState {
    /// Deal the first round of a brand new match.
    pub fn start_match(
        players: Vec<GamePlayer>,
        dealer_seat: usize,
        seed: u64,
        match_target: u32,
    ) -> (GameState, Vec<EventPayload>) {
        let mut state = GameState {
            players,
            deck: Vec::new(),
            talon: Vec::new(),
            dealer_seat,
            current_turn_index: 0,
            hand_number: 0,
            scores: TeamTotals::default(),
            round_zings: TeamTotals::default(),
            pending_zing: None,
            last_capturer: None,
            match_target,
        };
        let events = state.begin_round(seed);
        (state, events)
    }

    /// Reshuffle, rotate the dealer one seat clockwise, and deal the first
    /// hand of a new round.
    pub fn start_new_round(&mut self, seed: u64) -> Vec<EventPayload> {
        let n = self.players.len();
        self.dealer_seat = (self.dealer_seat + 1) % n;
        for player in &mut self.players {
            player.hand.clear();
            player.taken.clear();
        }
        self.round_zings = TeamTotals::default();
        self.pending_zing = None;
        self.last_capturer = None;
        self.begin_round(seed)
    }

    fn begin_round(&mut self, seed: u64) -> Vec<EventPayload> {
        let (deck_to_deal, initial_talon) = cut_deck(seed);
        self.deck = deck_to_deal;
        self.talon = initial_talon;
        let n = self.players.len();
        self.current_turn_index = (self.dealer_seat + 1) % n;
        vec![self.deal_next_subround()]
    }

    /// Deal 4 cards to every player, starting from the seat after dealer,
    /// in seat order.
    fn deal_next_subround(&mut self) -> EventPayload {
        self.hand_number += 1;
        let n = self.players.len();
        let order: Vec<usize> = (0..n).map(|i| (self.dealer_seat + 1 + i) % n).collect();

        let mut dealt: BTreeMap<PlayerId, Vec<Card>> = BTreeMap::new();
        for idx in order {
            let mut cards = Vec::with_capacity(4);
            for _ in 0..4 {
                if let Some(card) = self.deck.pop() {
                    cards.push(card);
                }
            }
            let player = &mut self.players[idx];
            player.hand.extend(cards.iter().copied());
            dealt.insert(player.player_id.clone(), cards);
        }

        EventPayload::HandsDealt {
            hand_number: self.hand_number,
            dealt,
        }
    }

    pub fn current_turn_player(&self) -> &PlayerId {
        &self.players[self.current_turn_index].player_id
    }

    fn team_of(&self, player_id: &PlayerId) -> u8 {
        self.players
            .iter()
            .find(|p| &p.player_id == player_id)
            .map(|p| p.team)
            .unwrap_or(0)
    }

    fn player_index(&self, player_id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.player_id == player_id)
    }

    /// Apply a `play_card` intent. The caller
    /// (Room Actor) is responsible for turn/phase/pause validation — this
    /// method re-validates the card is actually in hand and returns
    /// [`EngineError::CardNotInHand`] otherwise, since that invariant must
    /// never be violated regardless of caller discipline.
    pub fn play_card(
        &mut self,
        player_id: &PlayerId,
        card: Card,
    ) -> Result<PlayCardOutcome, EngineError> {
        let idx = self
            .player_index(player_id)
            .ok_or_else(|| EngineError::UnknownPlayer(player_id.to_string()))?;

        let hand_pos = self.players[idx]
            .hand
            .iter()
            .position(|&c| c == card)
            .ok_or_else(|| EngineError::CardNotInHand(card.to_string()))?;
        self.players[idx].hand.remove(hand_pos);

        let prev_top = self.talon.last().copied();
        let prev_talon_size = self.talon.len();
        self.talon.push(card);

        let captured = card.is_jack() || prev_top.map(|t| t.rank == card.rank).unwrap_or(false);

        let mut events = Vec::new();

        if captured {
            let taken: Vec<Card> = self.talon.drain(..).collect();
            self.last_capturer = Some(player_id.clone());

            let zing = if prev_talon_size == 1 {
                let bottom = prev_top.expect("prev_talon_size == 1 implies prev_top is Some");
                if card.is_jack() && !bottom.is_jack() {
                    None
                } else if card.is_jack() && bottom.is_jack() {
                    Some(ZingInfo { points: 20, double: true })
                } else {
                    Some(ZingInfo { points: 10, double: false })
                }
            } else {
                None
            };

            if let Some(z) = &zing {
                let team = self.team_of(player_id);
                self.round_zings.add(team, z.points);
            }

            self.players[idx].taken.extend(&taken);
            self.pending_zing = None;

            events.push(EventPayload::TalonTaken {
                player_id: player_id.clone(),
                taken,
                zing,
            });
        } else {
            events.push(EventPayload::CardPlayed {
                player_id: player_id.clone(),
                card,
            });

            if self.talon.len() == 1 {
                self.pending_zing = Some(PendingZing {
                    card,
                    player_id: player_id.clone(),
                });
            } else {
                self.pending_zing = None;
            }
        }

        let n = self.players.len();
        self.current_turn_index = (self.current_turn_index + 1) % n;

        let hands_empty = self.players.iter().all(|p| p.hand.is_empty());
        let mut round_end = None;

        if hands_empty {
            if self.deck.is_empty() {
                if !self.talon.is_empty()
                    && let Some(capturer) = self.last_capturer.clone()
                    && let Some(cidx) = self.player_index(&capturer)
                {
                    let awarded: Vec<Card> = self.talon.drain(..).collect();
                    self.players[cidx].taken.extend(&awarded);
                    events.push(EventPayload::TalonAwarded {
                        player_id: capturer,
                        taken: awarded,
                    });
                }
                round_end = Some(self.compute_round_summary());
            } else {
                events.push(self.deal_next_subround());
            }
        }

        Ok(PlayCardOutcome { events, round_end })
    }

    /// Score the `taken` piles for every team at round end.
    fn compute_round_summary(&self) -> RoundSummary {
        let mut build_team = |team: u8| -> TeamRoundSummary {
            let mut scoring_cards = Vec::new();
            let mut base_points = 0u32;
            let mut taken_count = 0usize;
            let mut players = Vec::new();

            for p in self.players.iter().filter(|p| p.team == team) {
                players.push(p.player_id.clone());
                taken_count += p.taken.len();
                for &card in &p.taken {
                    let v = card.base_value();
                    if v > 0 {
                        base_points += v;
                        scoring_cards.push(card);
                    }
                }
            }

            let zings = self.round_zings.get(team);
            TeamRoundSummary {
                scoring_cards,
                zings,
                total_taken: taken_count,
                total_points: base_points + zings,
                players,
            }
        };

        let mut team0 = build_team(0);
        let mut team1 = build_team(1);

        let bonus = if team0.total_taken > team1.total_taken {
            Some(Bonus { reason: BonusReason::MostCards, awarded_to_team: 0 })
        } else if team1.total_taken > team0.total_taken {
            Some(Bonus { reason: BonusReason::MostCards, awarded_to_team: 1 })
        } else {
            let two_clubs = Card::new(crate::cards::Suit::Clubs, crate::cards::Rank::Two);
            let team_holding_two_clubs = self
                .players
                .iter()
                .find(|p| p.taken.contains(&two_clubs))
                .map(|p| p.team);
            team_holding_two_clubs.map(|team| Bonus { reason: BonusReason::TieTwoClubs, awarded_to_team: team })
        };

        if let Some(b) = &bonus {
            match b.awarded_to_team {
                0 => team0.total_points += 3,
                _ => team1.total_points += 3,
            }
        }

        RoundSummary { team0, team1, bonus }
    }
}

/// Implements the deck cut: split the shuffled 52 into halves A and B;
/// B's bottom card is reserved for the
/// dealer (dealt last of all), its top 4 cards become the initial visible
/// talon, and the remainder of B sits between A and the reserved card in
/// deal order. See DESIGN.md for the exact indexing this resolves to.
fn cut_deck(seed: u64) -> (Vec<Card>, Vec<Card>) {
    let mut shuffled = Card::full_deck();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let a = shuffled[0..26].to_vec();
    let b = &shuffled[26..52];

    let reserved = b[25];
    let initial_talon = b[0..4].to_vec();
    let b_remainder = b[4..25].to_vec();

    let mut deal_order = Vec::with_capacity(48);
    deal_order.extend(a);
    deal_order.extend(b_remainder);
    deal_order.push(reserved);

    // `deck` is drained from the back (`Vec::pop`), so reverse once here to
    // make the front of `deal_order` the next card dealt.
    deal_order.reverse();

    (deal_order, initial_talon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};

    fn two_player_game(seed: u64) -> GameState {
        let players = vec![
            GamePlayer {
                player_id: PlayerId::from("p1"),
                name: "P1".into(),
                seat: 0,
                team: 0,
                hand: Vec::new(),
                taken: Vec::new(),
            },
            GamePlayer {
                player_id: PlayerId::from("p2"),
                name: "P2".into(),
                seat: 1,
                team: 1,
                hand: Vec::new(),
                taken: Vec::new(),
            },
        ];
        let (state, _events) = GameState::start_match(players, 0, seed, 101);
        state
    }

    #[test]
    fn card_conservation_holds_through_a_full_round() {
        let mut state = two_player_game(42);
        loop {
            let current = state.current_turn_player().clone();
            let card = state.players[state.current_turn_index].hand[0];
            let outcome = state.play_card(&current, card).unwrap();
            assert_conserved(&state);
            if outcome.round_end.is_some() {
                break;
            }
        }
    }

    fn assert_conserved(state: &GameState) {
        let mut all = std::collections::HashSet::new();
        let mut total = 0;
        for c in &state.deck {
            assert!(all.insert(*c));
            total += 1;
        }
        for c in &state.talon {
            assert!(all.insert(*c));
            total += 1;
        }
        for p in &state.players {
            for c in &p.hand {
                assert!(all.insert(*c));
                total += 1;
            }
            for c in &p.taken {
                assert!(all.insert(*c));
                total += 1;
            }
        }
        assert_eq!(total, 52);
    }

    #[test]
    fn determinism_same_seed_same_events() {
        let run = |seed| {
            let mut state = two_player_game(seed);
            let mut log = Vec::new();
            loop {
                let current = state.current_turn_player().clone();
                let card = state.players[state.current_turn_index].hand[0];
                let outcome = state.play_card(&current, card).unwrap();
                log.push(format!("{:?}", outcome.events));
                if outcome.round_end.is_some() {
                    break;
                }
            }
            log
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn jack_sweeping_single_non_jack_is_not_a_zing() {
        let mut state = two_player_game(1);
        state.talon = vec![Card::new(Suit::Hearts, Rank::Four)];
        state.players[0].hand = vec![Card::new(Suit::Diamonds, Rank::J)];
        let outcome = state
            .play_card(&PlayerId::from("p1"), Card::new(Suit::Diamonds, Rank::J))
            .unwrap();
        match &outcome.events[0] {
            EventPayload::TalonTaken { zing, .. } => assert!(zing.is_none()),
            other => panic!("expected TalonTaken, got {other:?}"),
        }
        assert_eq!(state.round_zings.get(0), 0);
    }

    #[test]
    fn double_jack_zing_scores_20() {
        let mut state = two_player_game(1);
        state.talon = vec![Card::new(Suit::Clubs, Rank::J)];
        state.players[0].hand = vec![Card::new(Suit::Spades, Rank::J)];
        let outcome = state
            .play_card(&PlayerId::from("p1"), Card::new(Suit::Spades, Rank::J))
            .unwrap();
        match &outcome.events[0] {
            EventPayload::TalonTaken { zing: Some(z), .. } => {
                assert_eq!(z.points, 20);
                assert!(z.double);
            }
            other => panic!("expected double zing, got {other:?}"),
        }
        assert_eq!(state.round_zings.get(0), 20);
    }

    #[test]
    fn regular_zing_scores_10() {
        let mut state = two_player_game(1);
        state.talon = vec![Card::new(Suit::Spades, Rank::Seven)];
        state.players[0].hand = vec![Card::new(Suit::Hearts, Rank::Seven)];
        let outcome = state
            .play_card(&PlayerId::from("p1"), Card::new(Suit::Hearts, Rank::Seven))
            .unwrap();
        match &outcome.events[0] {
            EventPayload::TalonTaken { zing: Some(z), taken, .. } => {
                assert_eq!(z.points, 10);
                assert!(!z.double);
                assert_eq!(taken.len(), 2);
            }
            other => panic!("expected zing, got {other:?}"),
        }
    }

    #[test]
    fn capture_on_larger_talon_is_not_a_zing() {
        let mut state = two_player_game(1);
        state.talon = vec![
            Card::new(Suit::Hearts, Rank::Three),
            Card::new(Suit::Diamonds, Rank::Five),
        ];
        state.players[0].hand = vec![Card::new(Suit::Clubs, Rank::Five)];
        let outcome = state
            .play_card(&PlayerId::from("p1"), Card::new(Suit::Clubs, Rank::Five))
            .unwrap();
        match &outcome.events[0] {
            EventPayload::TalonTaken { zing, .. } => assert!(zing.is_none()),
            other => panic!("expected TalonTaken, got {other:?}"),
        }
    }

    #[test]
    fn card_not_in_hand_is_rejected() {
        let mut state = two_player_game(1);
        state.players[0].hand = vec![Card::new(Suit::Hearts, Rank::Three)];
        let err = state
            .play_card(&PlayerId::from("p1"), Card::new(Suit::Spades, Rank::King))
            .unwrap_err();
        assert!(matches!(err, EngineError::CardNotInHand(_)));
    }

    #[test]
    fn majority_bonus_awarded_to_team_with_more_taken_cards() {
        let mut state = two_player_game(1);
        state.players[0].taken = vec![Card::new(Suit::Hearts, Rank::Three); 30];
        state.players[1].taken = vec![Card::new(Suit::Diamonds, Rank::Four); 22];
        let summary = state.compute_round_summary();
        let bonus = summary.bonus.unwrap();
        assert_eq!(bonus.reason, BonusReason::MostCards);
        assert_eq!(bonus.awarded_to_team, 0);
    }

    #[test]
    fn tied_26_26_bonus_goes_to_two_of_clubs_holder() {
        let mut state = two_player_game(1);
        let filler = Card::new(Suit::Hearts, Rank::Three);
        state.players[0].taken = vec![filler; 26];
        let mut team1_taken = vec![filler; 25];
        team1_taken.push(Card::new(Suit::Clubs, Rank::Two));
        state.players[1].taken = team1_taken;
        let summary = state.compute_round_summary();
        let bonus = summary.bonus.unwrap();
        assert_eq!(bonus.reason, BonusReason::TieTwoClubs);
        assert_eq!(bonus.awarded_to_team, 1);
    }
}
