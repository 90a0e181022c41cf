use crate::model::{BetType, Sport};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Cap on the joined participant-token segment of a key.
pub const MAX_TEAMS_TOKEN_LEN: usize = 50;

static RE_ALPHA_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]{3,}").unwrap());

/// Bet-slang and market words that never identify a participant.
const STOP_WORDS: &[&str] = &[
    "over", "under", "parlay", "moneyline", "spread", "total", "prop", "line", "pts", "points",
    "reb", "rebounds", "ast", "assists", "units", "unit", "win", "won", "cash", "loss", "lost",
    "lose", "push", "void", "hook", "the", "and", "vs",
];

/// Canonical participant token: alphabetic runs of length >= 3, lowercased,
/// stop words dropped, deduplicated, sorted, joined and length-capped.
/// Sorting makes the token independent of mention order in the source text.
pub fn teams_token(raw_text: &str) -> String {
    let tokens: BTreeSet<String> = RE_ALPHA_RUN
        .find_iter(raw_text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect();
    if tokens.is_empty() {
        return "unknown".to_string();
    }
    let mut joined = tokens.into_iter().collect::<Vec<_>>().join("-");
    // Tokens are ASCII, so a byte truncation is a char truncation.
    joined.truncate(MAX_TEAMS_TOKEN_LEN);
    joined
}

/// Shared `sport|date|bet_type` prefix used for fuzzy candidate scans.
pub fn key_prefix(sport: Sport, date: NaiveDate, bet_type: BetType) -> String {
    format!("{}|{}|{}|", sport.as_str(), date.format("%Y-%m-%d"), bet_type.as_str())
}

/// Canonical correlation key for matching a bet against market data.
/// Pure function: identical inputs always produce the identical key.
pub fn build_key(raw_text: &str, sport: Sport, date: NaiveDate, bet_type: BetType) -> String {
    format!("{}{}", key_prefix(sport, date, bet_type), teams_token(raw_text))
}

/// Participant tokens of an existing key (the segment after the last '|').
pub fn key_tokens(event_key: &str) -> BTreeSet<&str> {
    event_key
        .rsplit('|')
        .next()
        .unwrap_or("")
        .split('-')
        .filter(|t| !t.is_empty() && *t != "unknown")
        .collect()
}
