use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Settlement outcome of a posted bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Push,
    Unresolved,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Push => "push",
            Outcome::Unresolved => "unresolved",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "win" => Outcome::Win,
            "loss" => Outcome::Loss,
            "push" => Outcome::Push,
            _ => Outcome::Unresolved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sport {
    Soccer,
    Football,
    Basketball,
    Baseball,
    Mma,
    Hockey,
    Unknown,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Soccer => "soccer",
            Sport::Football => "football",
            Sport::Basketball => "basketball",
            Sport::Baseball => "baseball",
            Sport::Mma => "mma",
            Sport::Hockey => "hockey",
            Sport::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "soccer" => Sport::Soccer,
            "football" => Sport::Football,
            "basketball" => Sport::Basketball,
            "baseball" => Sport::Baseball,
            "mma" => Sport::Mma,
            "hockey" => Sport::Hockey,
            _ => Sport::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetType {
    Moneyline,
    Spread,
    Total,
    Prop,
    Unknown,
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Moneyline => "moneyline",
            BetType::Spread => "spread",
            BetType::Total => "total",
            BetType::Prop => "prop",
            BetType::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "moneyline" => BetType::Moneyline,
            "spread" => BetType::Spread,
            "total" => BetType::Total,
            "prop" => BetType::Prop,
            _ => BetType::Unknown,
        }
    }
}

/// Which side of a line the bettor took. `Fav`/`Dog` only make sense for
/// spreads, `Over`/`Under` only for totals and props.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Fav,
    Dog,
    Over,
    Under,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Fav => "fav",
            Side::Dog => "dog",
            Side::Over => "over",
            Side::Under => "under",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fav" => Some(Side::Fav),
            "dog" => Some(Side::Dog),
            "over" => Some(Side::Over),
            "under" => Some(Side::Under),
            _ => None,
        }
    }

    pub fn valid_for(&self, bet_type: BetType) -> bool {
        match bet_type {
            BetType::Spread => matches!(self, Side::Fav | Side::Dog),
            BetType::Total | BetType::Prop => matches!(self, Side::Over | Side::Under),
            _ => false,
        }
    }
}

/// One line of text classified into a structured bet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedBet {
    pub raw_text: String,
    pub stake_units: f64,
    pub posted_odds: Option<String>,
    pub outcome: Outcome,
    pub signed_result: f64,
    pub sport: Sport,
    pub bet_type: BetType,
    pub posted_line: Option<f64>,
    pub posted_side: Option<Side>,
}

/// Persisted bet. `closing_line`/`closing_odds` start empty and are filled
/// exactly once by reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: i64,
    pub guild_id: i64,
    pub raw_text: String,
    pub stake_units: f64,
    pub posted_odds: Option<String>,
    pub outcome: Outcome,
    pub signed_result: f64,
    pub event_date: NaiveDate,
    pub sport: Sport,
    pub bet_type: BetType,
    pub posted_line: Option<f64>,
    pub posted_side: Option<Side>,
    pub closing_line: Option<f64>,
    pub closing_odds: Option<String>,
}

impl BetRecord {
    pub fn is_reconciled(&self) -> bool {
        self.closing_line.is_some() || self.closing_odds.is_some()
    }
}

/// Cached closing-market data point. Append-only: new fetches insert new
/// rows and the most recently fetched row is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingSnapshot {
    pub guild_id: i64,
    pub event_key: String,
    pub closing_line: Option<f64>,
    pub closing_odds: Option<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl ClosingSnapshot {
    pub fn has_data(&self) -> bool {
        self.closing_line.is_some() || self.closing_odds.is_some()
    }
}

/// Ranked fuzzy-match candidate, computed at query time.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub overlap_score: usize,
    pub label: String,
    pub closing_line: Option<f64>,
    pub closing_odds: Option<String>,
    pub source_event_key: String,
}

/// Pending human decision over a candidate set. At most one unresolved
/// ticket exists per bet; `candidates` is frozen at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationTicket {
    pub id: i64,
    pub bet_id: i64,
    pub guild_id: i64,
    pub candidates: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_domain_follows_bet_type() {
        assert!(Side::Fav.valid_for(BetType::Spread));
        assert!(Side::Dog.valid_for(BetType::Spread));
        assert!(!Side::Over.valid_for(BetType::Spread));
        assert!(Side::Over.valid_for(BetType::Total));
        assert!(Side::Under.valid_for(BetType::Prop));
        assert!(!Side::Fav.valid_for(BetType::Total));
        assert!(!Side::Dog.valid_for(BetType::Moneyline));
    }

    #[test]
    fn enum_strings_round_trip() {
        for outcome in [Outcome::Win, Outcome::Loss, Outcome::Push, Outcome::Unresolved] {
            assert_eq!(Outcome::from_str(outcome.as_str()), outcome);
        }
        for bet_type in [
            BetType::Moneyline,
            BetType::Spread,
            BetType::Total,
            BetType::Prop,
            BetType::Unknown,
        ] {
            assert_eq!(BetType::from_str(bet_type.as_str()), bet_type);
        }
        for sport in [Sport::Soccer, Sport::Mma, Sport::Unknown] {
            assert_eq!(Sport::from_str(sport.as_str()), sport);
        }
    }
}
