//! Playing cards: suits, ranks, and the canonical `"<suit>-<rank>"` wire id.
//!
//! This module has no notion of hands, decks-in-play, or capture rules —
//! those live in [`crate::engine`]. It only knows how to enumerate the 52
//! cards and how to parse/print the canonical id form described in the
//! protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four French suits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    fn as_str(&self) -> &'static str {
        match self {
            Suit::Hearts => "hearts",
            Suit::Diamonds => "diamonds",
            Suit::Clubs => "clubs",
            Suit::Spades => "spades",
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suit {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hearts" => Ok(Suit::Hearts),
            "diamonds" => Ok(Suit::Diamonds),
            "clubs" => Ok(Suit::Clubs),
            "spades" => Ok(Suit::Spades),
            _ => Err(CardParseError::UnknownSuit(s.to_string())),
        }
    }
}

/// Card rank. Ace is high only for display purposes — the rules engine
/// never compares ranks by order, only by equality (capture) or identity
/// (jack).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    J,
    Q,
    K,
    A,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::J,
        Rank::Q,
        Rank::K,
        Rank::A,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::J => "J",
            Rank::Q => "Q",
            Rank::K => "K",
            Rank::A => "A",
        }
    }

    /// Whether this rank is worth a non-zero base point value regardless
    /// of suit (ten, jack, queen, king, ace all count for 1 outside of
    /// 10♦ which is worth 2 — see [`Card::base_value`]).
    fn is_scoring_face(&self) -> bool {
        matches!(self, Rank::Ten | Rank::J | Rank::Q | Rank::K | Rank::A)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2" => Ok(Rank::Two),
            "3" => Ok(Rank::Three),
            "4" => Ok(Rank::Four),
            "5" => Ok(Rank::Five),
            "6" => Ok(Rank::Six),
            "7" => Ok(Rank::Seven),
            "8" => Ok(Rank::Eight),
            "9" => Ok(Rank::Nine),
            "10" => Ok(Rank::Ten),
            "J" => Ok(Rank::J),
            "Q" => Ok(Rank::Q),
            "K" => Ok(Rank::K),
            "A" => Ok(Rank::A),
            _ => Err(CardParseError::UnknownRank(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CardParseError {
    #[error("malformed card id {0:?}, expected \"<suit>-<rank>\"")]
    MalformedId(String),
    #[error("unknown suit {0:?}")]
    UnknownSuit(String),
    #[error("unknown rank {0:?}")]
    UnknownRank(String),
}

/// A single playing card, identified on the wire as `"<suit>-<rank>"`
/// (e.g. `"diamonds-10"`, `"clubs-J"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// Base point value counted from a team's `taken` pile at round end.
    ///
    /// `10♦ = 2`; any of `{10, J, Q, K, A}` of other suits `= 1`; `2♣ = 1`;
    /// all other cards `= 0`.
    pub fn base_value(&self) -> u32 {
        if self.suit == Suit::Diamonds && self.rank == Rank::Ten {
            2
        } else if self.rank.is_scoring_face() {
            1
        } else if self.suit == Suit::Clubs && self.rank == Rank::Two {
            1
        } else {
            0
        }
    }

    pub fn is_jack(&self) -> bool {
        self.rank == Rank::J
    }

    /// The full 52-card deck in canonical order (suits outer, ranks inner).
    pub fn full_deck() -> Vec<Card> {
        let mut cards = Vec::with_capacity(52);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(suit, rank));
            }
        }
        cards
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.suit, self.rank)
    }
}

impl FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (suit, rank) = s
            .split_once('-')
            .ok_or_else(|| CardParseError::MalformedId(s.to_string()))?;
        Ok(Card::new(suit.parse()?, rank.parse()?))
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_deck_has_52_unique_cards() {
        let deck = Card::full_deck();
        assert_eq!(deck.len(), 52);
        let unique: std::collections::HashSet<_> = deck.iter().collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn canonical_id_round_trips() {
        for card in Card::full_deck() {
            let id = card.to_string();
            let parsed: Card = id.parse().unwrap();
            assert_eq!(card, parsed);
        }
    }

    #[test]
    fn base_values() {
        assert_eq!(Card::new(Suit::Diamonds, Rank::Ten).base_value(), 2);
        assert_eq!(Card::new(Suit::Hearts, Rank::Ten).base_value(), 1);
        assert_eq!(Card::new(Suit::Spades, Rank::A).base_value(), 1);
        assert_eq!(Card::new(Suit::Clubs, Rank::Two).base_value(), 1);
        assert_eq!(Card::new(Suit::Hearts, Rank::Two).base_value(), 0);
        assert_eq!(Card::new(Suit::Clubs, Rank::Seven).base_value(), 0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("nope".parse::<Card>().is_err());
        assert!("hearts-11".parse::<Card>().is_err());
        assert!("wands-5".parse::<Card>().is_err());
    }
}
