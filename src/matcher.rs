use crate::event_key::{key_prefix, key_tokens};
use crate::model::{BetType, ClosingSnapshot, MatchCandidate, Sport};
use crate::store::{Result, Store};
use chrono::{NaiveDate, Utc};
use tracing::debug;

/// A fuzzy candidate needs at least this many shared participant tokens to
/// be auto-accepted. Deliberately low-precision/high-recall: common cases
/// resolve themselves, ambiguous ones go to a human.
pub const MIN_OVERLAP_FOR_AUTO_MATCH: usize = 1;

/// How many recent same-prefix snapshots a fuzzy scan considers.
pub const FUZZY_SCAN_WINDOW: usize = 200;

/// Candidate lists shown to a human are capped here.
pub const MAX_CANDIDATES: usize = 5;

#[derive(Debug, Clone)]
pub enum MatchResult {
    Matched {
        closing_line: Option<f64>,
        closing_odds: Option<String>,
        source: String,
    },
    Candidates(Vec<MatchCandidate>),
    NoMatch,
}

/// Resolves a bet's event key against the closing-snapshot cache: exact
/// lookup first, then token-overlap scoring over a bounded recent window.
pub struct ConsensusMatcher {
    min_overlap: usize,
    window: usize,
}

impl Default for ConsensusMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusMatcher {
    pub fn new() -> Self {
        Self {
            min_overlap: MIN_OVERLAP_FOR_AUTO_MATCH,
            window: FUZZY_SCAN_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn resolve(
        &self,
        store: &Store,
        guild_id: i64,
        event_key: &str,
        sport: Sport,
        date: NaiveDate,
        bet_type: BetType,
    ) -> Result<MatchResult> {
        // Exact lookup is cheap and precise when the bet text and the feed
        // tokenize identically.
        if let Some(snap) = store.latest_snapshot(guild_id, event_key)? {
            if snap.has_data() {
                return Ok(MatchResult::Matched {
                    closing_line: snap.closing_line,
                    closing_odds: snap.closing_odds,
                    source: snap.source,
                });
            }
        }

        let prefix = key_prefix(sport, date, bet_type);
        let snapshots = store.recent_snapshots_with_prefix(guild_id, &prefix, self.window)?;
        let query_tokens = key_tokens(event_key);

        let mut scored: Vec<(usize, ClosingSnapshot)> = snapshots
            .into_iter()
            .filter(|s| s.has_data())
            .map(|s| {
                let overlap = key_tokens(&s.event_key)
                    .intersection(&query_tokens)
                    .count();
                (overlap, s)
            })
            .collect();
        if scored.is_empty() {
            return Ok(MatchResult::NoMatch);
        }

        scored.sort_by(|(oa, sa), (ob, sb)| {
            ob.cmp(oa).then_with(|| {
                // Same overlap: prefer the key that reads closer to ours.
                let ja = strsim::jaro_winkler(event_key, &sa.event_key);
                let jb = strsim::jaro_winkler(event_key, &sb.event_key);
                jb.partial_cmp(&ja).unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        let (best_overlap, best) = &scored[0];
        if *best_overlap >= self.min_overlap {
            debug!(
                event_key,
                source_key = %best.event_key,
                overlap = best_overlap,
                "Fuzzy auto-match accepted"
            );
            // Write-through under the query's own key so the next lookup is
            // an exact hit.
            let accepted = ClosingSnapshot {
                guild_id,
                event_key: event_key.to_string(),
                closing_line: best.closing_line,
                closing_odds: best.closing_odds.clone(),
                source: best.source.clone(),
                fetched_at: Utc::now(),
            };
            store.insert_snapshot(&accepted)?;
            return Ok(MatchResult::Matched {
                closing_line: accepted.closing_line,
                closing_odds: accepted.closing_odds,
                source: accepted.source,
            });
        }

        let candidates = scored
            .into_iter()
            .take(MAX_CANDIDATES)
            .map(|(overlap, snap)| MatchCandidate {
                overlap_score: overlap,
                label: format_candidate_label(&snap),
                closing_line: snap.closing_line,
                closing_odds: snap.closing_odds,
                source_event_key: snap.event_key,
            })
            .collect();
        Ok(MatchResult::Candidates(candidates))
    }
}

/// Human-readable candidate label. The disambiguation queue parses the
/// closing data back out of this, so the grammar must round-trip.
pub fn format_candidate_label(snap: &ClosingSnapshot) -> String {
    let line = snap
        .closing_line
        .map(|l| format!("{l}"))
        .unwrap_or_else(|| "-".to_string());
    let odds = snap.closing_odds.as_deref().unwrap_or("-");
    format!(
        "{} | line {} | odds {} | {}",
        snap.event_key, line, odds, snap.source
    )
}

/// Inverse of [`format_candidate_label`].
pub fn parse_candidate_label(label: &str) -> Option<(Option<f64>, Option<String>)> {
    let mut parts = label.split(" | ");
    let _key = parts.next()?;
    let line_part = parts.next()?.strip_prefix("line ")?;
    let odds_part = parts.next()?.strip_prefix("odds ")?;
    let closing_line = if line_part == "-" {
        None
    } else {
        Some(line_part.parse().ok()?)
    };
    let closing_odds = if odds_part == "-" {
        None
    } else {
        Some(odds_part.to_string())
    };
    Some((closing_line, closing_odds))
}
