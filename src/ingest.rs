use crate::parser;
use crate::store::{Result, Store};
use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

/// Counts for the confirmation summary after one posting is processed.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestSummary {
    pub logged: usize,
    pub skipped: usize,
}

/// Process one inbound `(text, scope, timestamp)` event: collapse parlay
/// blocks, parse every remaining line, and persist the ones that classify.
/// Lines with no outcome signal are skipped silently, never reported as
/// errors.
///
/// The event date is the scope's override date when one is set, then the
/// posting's own recap-trailer date, then the day the message arrived.
pub fn log_message(
    store: &Store,
    guild_id: i64,
    content: &str,
    received_at: DateTime<Utc>,
) -> Result<IngestSummary> {
    let event_date = store
        .get_override_date(guild_id)?
        .or_else(|| parser::recap_date(content, received_at.year()))
        .unwrap_or_else(|| received_at.date_naive());

    let mut summary = IngestSummary::default();
    for line in parser::message_lines(content) {
        match parser::parse(&line) {
            Some(bet) => {
                store.insert_bet(guild_id, &bet, event_date)?;
                summary.logged += 1;
            }
            None => {
                debug!(guild_id, line = %line, "Line did not classify as a bet");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn logs_parseable_lines_and_skips_rest() {
        let store = Store::open_in_memory().unwrap();
        let now: DateTime<Utc> = "2024-11-02T18:00:00Z".parse().unwrap();
        let summary = log_message(
            &store,
            42,
            "2u Lakers -3.5 -110 🏀 ✅\nno signal here\nJets +7 ❌",
            now,
        )
        .unwrap();
        assert_eq!(summary.logged, 2);
        assert_eq!(summary.skipped, 1);
        let bets = store.unresolved_bets(42, 10).unwrap();
        assert_eq!(bets.len(), 2);
        assert!(bets.iter().all(|b| b.event_date
            == NaiveDate::from_ymd_opt(2024, 11, 2).unwrap()));
    }

    #[test]
    fn recap_trailer_date_beats_arrival_day() {
        let store = Store::open_in_memory().unwrap();
        let now: DateTime<Utc> = "2024-11-02T18:00:00Z".parse().unwrap();
        let summary = log_message(&store, 42, "Jets +7 ❌\n10/31: 0-1", now).unwrap();
        // The trailer itself is bookkeeping, not a skipped bet line.
        assert_eq!(summary.logged, 1);
        assert_eq!(summary.skipped, 0);
        let bets = store.unresolved_bets(42, 10).unwrap();
        assert_eq!(bets[0].event_date, NaiveDate::from_ymd_opt(2024, 10, 31).unwrap());
    }

    #[test]
    fn parlay_block_logs_as_one_bet() {
        let store = Store::open_in_memory().unwrap();
        let now: DateTime<Utc> = "2024-11-02T18:00:00Z".parse().unwrap();
        let summary = log_message(
            &store,
            42,
            "2u parlay ✅:\nLakers -3.5\nCeltics ML\n1u Jets +7 ❌",
            now,
        )
        .unwrap();
        assert_eq!(summary.logged, 2);
        let bets = store.unresolved_bets(42, 10).unwrap();
        assert_eq!(bets.len(), 2);
        // Legs are part of the parlay record, not bets of their own.
        assert!(bets.iter().any(|b| b.stake_units == 2.0 && b.raw_text.contains('|')));
    }

    #[test]
    fn override_date_wins_over_arrival_day() {
        let store = Store::open_in_memory().unwrap();
        let override_date = NaiveDate::from_ymd_opt(2024, 10, 31).unwrap();
        store.set_override_date(42, override_date).unwrap();
        let now: DateTime<Utc> = "2024-11-02T18:00:00Z".parse().unwrap();
        log_message(&store, 42, "Jets +7 ❌", now).unwrap();
        let bets = store.unresolved_bets(42, 10).unwrap();
        assert_eq!(bets[0].event_date, override_date);
    }
}
