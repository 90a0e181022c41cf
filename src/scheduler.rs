use crate::disambiguation;
use crate::event_key::build_key;
use crate::matcher::{ConsensusMatcher, MatchResult};
use crate::model::{ClosingSnapshot, Sport};
use crate::notify::Notifier;
use crate::odds_feed::NormalizedClosing;
use crate::store::Store;
use anyhow::Result;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// How many unresolved bets one reconciliation pass visits per scope.
pub const UNRESOLVED_BATCH: usize = 300;

/// Automatic runs fire twice weekly at a fixed hour.
const RUN_DAYS: [Weekday; 2] = [Weekday::Tue, Weekday::Fri];
const RUN_HOUR: u32 = 3;

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileSummary {
    pub snapshots: usize,
    pub updated: usize,
    pub queued: usize,
    pub unmatched: usize,
}

/// Periodic batch driver: refreshes the closing-snapshot cache from the
/// feed, then walks unresolved bets through the consensus matcher. Scopes
/// are processed strictly one at a time; a failure in one scope never
/// aborts the others.
pub struct ReconciliationScheduler<N: Notifier> {
    store: Arc<Mutex<Store>>,
    matcher: ConsensusMatcher,
    notifier: N,
    sports: Vec<Sport>,
    batch: usize,
}

impl<N: Notifier> ReconciliationScheduler<N> {
    pub fn new(store: Arc<Mutex<Store>>, notifier: N, sports: Vec<Sport>) -> Self {
        Self {
            store,
            matcher: ConsensusMatcher::new(),
            notifier,
            sports,
            batch: UNRESOLVED_BATCH,
        }
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    /// Trigger policy for automatic runs.
    pub fn is_due(now: DateTime<Utc>) -> bool {
        RUN_DAYS.contains(&now.weekday()) && now.hour() == RUN_HOUR && now.minute() == 0
    }

    /// Background loop: checks the trigger once a minute. Dropping the
    /// future between ticks is a clean stop; every scope's work is fully
    /// committed before the next scope starts.
    pub async fn run_forever<F, Fut>(&self, fetch: F)
    where
        F: Fn(Sport) -> Fut,
        Fut: Future<Output = Result<Vec<NormalizedClosing>>>,
    {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            if Self::is_due(Utc::now()) {
                self.run_all(&fetch).await;
            }
        }
    }

    /// One full pass over every active scope.
    pub async fn run_all<F, Fut>(&self, fetch: &F)
    where
        F: Fn(Sport) -> Fut,
        Fut: Future<Output = Result<Vec<NormalizedClosing>>>,
    {
        let guilds = match self.store.lock().await.active_guilds() {
            Ok(guilds) => guilds,
            Err(e) => {
                error!("Could not list active scopes: {e}");
                return;
            }
        };
        info!("Reconciliation pass over {} scope(s)", guilds.len());
        for guild_id in guilds {
            match self.run_for_scope(guild_id, fetch).await {
                Ok(summary) => {
                    info!(
                        guild_id,
                        updated = summary.updated,
                        queued = summary.queued,
                        unmatched = summary.unmatched,
                        "Scope reconciled"
                    );
                }
                Err(e) => {
                    // Next scope still runs.
                    error!(guild_id, "Reconciliation failed for scope: {e}");
                }
            }
        }
    }

    /// Reconcile a single scope. Also the manual, on-demand entry point.
    pub async fn run_for_scope<F, Fut>(&self, guild_id: i64, fetch: &F) -> Result<ReconcileSummary>
    where
        F: Fn(Sport) -> Fut,
        Fut: Future<Output = Result<Vec<NormalizedClosing>>>,
    {
        let mut summary = ReconcileSummary::default();

        // Cache refresh: one feed call per tracked sport, failures logged
        // per sport and skipped.
        for sport in &self.sports {
            match fetch(*sport).await {
                Ok(rows) => {
                    let fetched_at = Utc::now();
                    let store = self.store.lock().await;
                    for row in rows {
                        store.insert_snapshot(&ClosingSnapshot {
                            guild_id,
                            event_key: row.event_key,
                            closing_line: row.closing_line,
                            closing_odds: row.closing_odds,
                            source: row.source,
                            fetched_at,
                        })?;
                        summary.snapshots += 1;
                    }
                }
                Err(e) => {
                    warn!(guild_id, sport = sport.as_str(), "Odds fetch failed: {e}");
                }
            }
        }

        let bets = self.store.lock().await.unresolved_bets(guild_id, self.batch)?;
        for bet in bets {
            let key = build_key(&bet.raw_text, bet.sport, bet.event_date, bet.bet_type);
            let store = self.store.lock().await;
            let resolution =
                self.matcher
                    .resolve(&store, guild_id, &key, bet.sport, bet.event_date, bet.bet_type);
            match resolution {
                Ok(MatchResult::Matched {
                    closing_line,
                    closing_odds,
                    ..
                }) => match store.set_closing(bet.id, closing_line, closing_odds.as_deref()) {
                    Ok(true) => summary.updated += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(bet_id = bet.id, "Closing write failed: {e}");
                    }
                },
                Ok(MatchResult::Candidates(candidates)) => {
                    match disambiguation::enqueue(&store, bet.id, guild_id, &candidates) {
                        Ok(Some(_)) => summary.queued += 1,
                        Ok(None) => {}
                        Err(e) => {
                            warn!(bet_id = bet.id, "Ticket enqueue failed: {e}");
                        }
                    }
                }
                Ok(MatchResult::NoMatch) => {
                    // Left for a later run; the feed may not have this
                    // market yet.
                    summary.unmatched += 1;
                }
                Err(e) => {
                    // One bet's storage trouble abandons that bet only.
                    warn!(bet_id = bet.id, "Resolution attempt failed: {e}");
                }
            }
        }

        let channel_id = self.store.lock().await.get_channel_id(guild_id)?;
        self.notifier.notify(
            guild_id,
            channel_id,
            &format!(
                "🤖 CLV update: filled {} bets, {} awaiting review, {} unmatched.",
                summary.updated, summary.queued, summary.unmatched
            ),
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::parser;
    use chrono::{NaiveDate, TimeZone};

    async fn fetch_nothing(_sport: Sport) -> Result<Vec<NormalizedClosing>> {
        Ok(Vec::new())
    }

    #[test]
    fn trigger_policy_fires_twice_weekly() {
        // 2024-11-05 is a Tuesday, 2024-11-08 a Friday.
        let due = Utc.with_ymd_and_hms(2024, 11, 5, 3, 0, 30).unwrap();
        assert!(ReconciliationScheduler::<RecordingNotifier>::is_due(due));
        let friday = Utc.with_ymd_and_hms(2024, 11, 8, 3, 0, 0).unwrap();
        assert!(ReconciliationScheduler::<RecordingNotifier>::is_due(friday));
        let wrong_hour = Utc.with_ymd_and_hms(2024, 11, 5, 4, 0, 0).unwrap();
        assert!(!ReconciliationScheduler::<RecordingNotifier>::is_due(wrong_hour));
        let wednesday = Utc.with_ymd_and_hms(2024, 11, 6, 3, 0, 0).unwrap();
        assert!(!ReconciliationScheduler::<RecordingNotifier>::is_due(wednesday));
    }

    #[tokio::test]
    async fn one_failed_write_does_not_abandon_the_batch() {
        let store = Store::open_in_memory().unwrap();
        let parsed = parser::parse("Lakers -3.5 ✅").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
        let first = store.insert_bet(42, &parsed, date).unwrap();
        let second = store.insert_bet(42, &parsed, date).unwrap();
        let key = build_key(&parsed.raw_text, parsed.sport, date, parsed.bet_type);
        store
            .insert_snapshot(&ClosingSnapshot {
                guild_id: 42,
                event_key: key,
                closing_line: Some(-4.5),
                closing_odds: Some("-110".to_string()),
                source: "oddsapi".to_string(),
                fetched_at: Utc::now(),
            })
            .unwrap();
        // Newest bet is visited first; refuse its closing write at the
        // database layer so the pass hits a storage error mid-batch.
        store
            .execute_sql(&format!(
                "CREATE TRIGGER block_write BEFORE UPDATE ON bets WHEN NEW.id = {second}
                 BEGIN SELECT RAISE(ABORT, 'write refused'); END;"
            ))
            .unwrap();

        let store = Arc::new(Mutex::new(store));
        let sched = ReconciliationScheduler::new(
            store.clone(),
            RecordingNotifier::default(),
            vec![Sport::Basketball],
        );
        let summary = sched.run_for_scope(42, &fetch_nothing).await.unwrap();
        // The blocked bet was skipped, the rest of the batch still ran.
        assert_eq!(summary.updated, 1);
        let s = store.lock().await;
        assert!(s.get_bet(first).unwrap().unwrap().is_reconciled());
        assert!(!s.get_bet(second).unwrap().unwrap().is_reconciled());
    }
}
