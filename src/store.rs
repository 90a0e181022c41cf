use crate::model::{
    BetRecord, BetType, ClosingSnapshot, DisambiguationTicket, Outcome, ParsedBet, Side, Sport,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("bet {0} not found or already reconciled")]
    BetNotFound(i64),
    #[error("ticket {0} not found or already resolved")]
    TicketNotFound(i64),
    #[error("candidate payload is not valid JSON: {0}")]
    BadCandidates(#[from] serde_json::Error),
    #[error("candidate index {0} out of range (ticket has {1})")]
    BadCandidateIndex(usize, usize),
    #[error("candidate label not parseable: {0}")]
    BadCandidateLabel(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// SQLite-backed record store. Constructed explicitly and passed into each
/// component; atomicity of multi-row updates comes from SQLite transactions
/// rather than in-process locks.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::bootstrap(&conn)?;
        info!("Record store ready at {path}");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(&conn)?;
        Ok(Self { conn })
    }

    fn bootstrap(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                bet_text TEXT NOT NULL,
                units REAL NOT NULL,
                odds TEXT,
                status TEXT NOT NULL,
                result REAL NOT NULL,
                event_date TEXT NOT NULL,
                sport TEXT NOT NULL,
                bet_type TEXT NOT NULL,
                posted_line REAL,
                posted_side TEXT,
                closing_line REAL,
                closing_odds TEXT
            );
            CREATE TABLE IF NOT EXISTS settings (
                guild_id INTEGER PRIMARY KEY,
                channel_id INTEGER,
                override_date TEXT
            );
            CREATE TABLE IF NOT EXISTS closings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                event_key TEXT NOT NULL,
                closing_line REAL,
                closing_odds TEXT,
                source TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_closings_guild_key
                ON closings(guild_id, event_key, id DESC);
            CREATE TABLE IF NOT EXISTS clv_fixes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bet_id INTEGER NOT NULL REFERENCES bets(id) ON DELETE CASCADE,
                guild_id INTEGER NOT NULL,
                candidates TEXT NOT NULL,
                created_at TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_fixes_pending
                ON clv_fixes(guild_id, resolved, created_at);",
        )?;
        Ok(())
    }

    // --- Bets ---

    pub fn insert_bet(
        &self,
        guild_id: i64,
        bet: &ParsedBet,
        event_date: NaiveDate,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO bets (guild_id, bet_text, units, odds, status, result, event_date,
                               sport, bet_type, posted_line, posted_side)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                guild_id,
                bet.raw_text,
                bet.stake_units,
                bet.posted_odds,
                bet.outcome.as_str(),
                bet.signed_result,
                event_date,
                bet.sport.as_str(),
                bet.bet_type.as_str(),
                bet.posted_line,
                bet.posted_side.map(|s| s.as_str()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_bet(&self, id: i64) -> Result<Option<BetRecord>> {
        let bet = self
            .conn
            .query_row(
                "SELECT id, guild_id, bet_text, units, odds, status, result, event_date,
                        sport, bet_type, posted_line, posted_side, closing_line, closing_odds
                 FROM bets WHERE id = ?1",
                params![id],
                row_to_bet,
            )
            .optional()?;
        Ok(bet)
    }

    /// Fill the closing fields of a bet, exactly once. A bet that already
    /// has either closing field keeps it; re-running is a no-op.
    pub fn set_closing(
        &self,
        bet_id: i64,
        closing_line: Option<f64>,
        closing_odds: Option<&str>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE bets SET closing_line = ?1, closing_odds = ?2
             WHERE id = ?3 AND closing_line IS NULL AND closing_odds IS NULL",
            params![closing_line, closing_odds, bet_id],
        )?;
        Ok(changed > 0)
    }

    /// Most recent bets with both closing fields still empty.
    pub fn unresolved_bets(&self, guild_id: i64, limit: usize) -> Result<Vec<BetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, guild_id, bet_text, units, odds, status, result, event_date,
                    sport, bet_type, posted_line, posted_side, closing_line, closing_odds
             FROM bets
             WHERE guild_id = ?1 AND closing_line IS NULL AND closing_odds IS NULL
             ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![guild_id, limit as i64], row_to_bet)?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    // --- Closing snapshots (append-only) ---

    pub fn insert_snapshot(&self, snapshot: &ClosingSnapshot) -> Result<()> {
        self.conn.execute(
            "INSERT INTO closings (guild_id, event_key, closing_line, closing_odds, source, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.guild_id,
                snapshot.event_key,
                snapshot.closing_line,
                snapshot.closing_odds,
                snapshot.source,
                snapshot.fetched_at,
            ],
        )?;
        Ok(())
    }

    /// Most recently fetched snapshot for an exact event key.
    pub fn latest_snapshot(&self, guild_id: i64, event_key: &str) -> Result<Option<ClosingSnapshot>> {
        let snap = self
            .conn
            .query_row(
                "SELECT guild_id, event_key, closing_line, closing_odds, source, fetched_at
                 FROM closings WHERE guild_id = ?1 AND event_key = ?2
                 ORDER BY fetched_at DESC, id DESC LIMIT 1",
                params![guild_id, event_key],
                row_to_snapshot,
            )
            .optional()?;
        Ok(snap)
    }

    /// Recent snapshots whose keys share a `sport|date|bet_type|` prefix,
    /// newest first, bounded.
    pub fn recent_snapshots_with_prefix(
        &self,
        guild_id: i64,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<ClosingSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT guild_id, event_key, closing_line, closing_odds, source, fetched_at
             FROM closings
             WHERE guild_id = ?1 AND event_key LIKE ?2 || '%'
             ORDER BY id DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![guild_id, prefix, limit as i64], row_to_snapshot)?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    // --- Disambiguation tickets ---

    /// Create a pending ticket unless one already exists for the bet.
    /// Returns the new ticket id, or `None` when the call was a no-op.
    pub fn insert_ticket(
        &self,
        bet_id: i64,
        guild_id: i64,
        candidates: &[String],
    ) -> Result<Option<i64>> {
        let payload = serde_json::to_string(candidates)?;
        let inserted = self.conn.execute(
            "INSERT INTO clv_fixes (bet_id, guild_id, candidates, created_at, resolved)
             SELECT ?1, ?2, ?3, ?4, 0
             WHERE NOT EXISTS (
                 SELECT 1 FROM clv_fixes WHERE bet_id = ?1 AND resolved = 0
             )",
            params![bet_id, guild_id, payload, Utc::now()],
        )?;
        if inserted > 0 {
            Ok(Some(self.conn.last_insert_rowid()))
        } else {
            Ok(None)
        }
    }

    pub fn get_ticket(&self, ticket_id: i64) -> Result<Option<DisambiguationTicket>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, bet_id, guild_id, candidates, created_at, resolved
                 FROM clv_fixes WHERE id = ?1",
                params![ticket_id],
                row_to_ticket,
            )
            .optional()?;
        row.map(TicketRow::into_ticket).transpose()
    }

    pub fn oldest_unresolved_ticket(&self, guild_id: i64) -> Result<Option<DisambiguationTicket>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, bet_id, guild_id, candidates, created_at, resolved
                 FROM clv_fixes WHERE guild_id = ?1 AND resolved = 0
                 ORDER BY created_at ASC, id ASC LIMIT 1",
                params![guild_id],
                row_to_ticket,
            )
            .optional()?;
        row.map(TicketRow::into_ticket).transpose()
    }

    /// Apply a human decision: write the chosen closing data to the bet and
    /// mark the ticket resolved, atomically. Either both rows change or
    /// neither does.
    pub fn resolve_ticket(
        &mut self,
        ticket_id: i64,
        closing_line: Option<f64>,
        closing_odds: Option<&str>,
    ) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let (bet_id, resolved): (i64, bool) = tx
            .query_row(
                "SELECT bet_id, resolved FROM clv_fixes WHERE id = ?1",
                params![ticket_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(StoreError::TicketNotFound(ticket_id))?;
        if resolved {
            return Err(StoreError::TicketNotFound(ticket_id));
        }
        let changed = tx.execute(
            "UPDATE bets SET closing_line = ?1, closing_odds = ?2
             WHERE id = ?3 AND closing_line IS NULL AND closing_odds IS NULL",
            params![closing_line, closing_odds, bet_id],
        )?;
        if changed == 0 {
            return Err(StoreError::BetNotFound(bet_id));
        }
        tx.execute(
            "UPDATE clv_fixes SET resolved = 1 WHERE id = ?1",
            params![ticket_id],
        )?;
        tx.commit()?;
        Ok(bet_id)
    }

    // --- Scope settings ---

    pub fn set_channel(&self, guild_id: i64, channel_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (guild_id, channel_id) VALUES (?1, ?2)
             ON CONFLICT(guild_id) DO UPDATE SET channel_id = excluded.channel_id",
            params![guild_id, channel_id],
        )?;
        Ok(())
    }

    pub fn get_channel_id(&self, guild_id: i64) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT channel_id FROM settings WHERE guild_id = ?1",
                params![guild_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(id.flatten())
    }

    pub fn set_override_date(&self, guild_id: i64, date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (guild_id, override_date) VALUES (?1, ?2)
             ON CONFLICT(guild_id) DO UPDATE SET override_date = excluded.override_date",
            params![guild_id, date],
        )?;
        Ok(())
    }

    pub fn get_override_date(&self, guild_id: i64) -> Result<Option<NaiveDate>> {
        let date = self
            .conn
            .query_row(
                "SELECT override_date FROM settings WHERE guild_id = ?1",
                params![guild_id],
                |row| row.get::<_, Option<NaiveDate>>(0),
            )
            .optional()?;
        Ok(date.flatten())
    }

    pub fn clear_override_date(&self, guild_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE settings SET override_date = NULL WHERE guild_id = ?1",
            params![guild_id],
        )?;
        Ok(())
    }

    /// Scopes the scheduler should visit: anything with settings or bets.
    pub fn active_guilds(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT guild_id FROM settings
             UNION SELECT DISTINCT guild_id FROM bets
             ORDER BY guild_id",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }
}

fn row_to_bet(row: &Row<'_>) -> rusqlite::Result<BetRecord> {
    let status: String = row.get(5)?;
    let sport: String = row.get(8)?;
    let bet_type: String = row.get(9)?;
    let posted_side: Option<String> = row.get(11)?;
    Ok(BetRecord {
        id: row.get(0)?,
        guild_id: row.get(1)?,
        raw_text: row.get(2)?,
        stake_units: row.get(3)?,
        posted_odds: row.get(4)?,
        outcome: Outcome::from_str(&status),
        signed_result: row.get(6)?,
        event_date: row.get(7)?,
        sport: Sport::from_str(&sport),
        bet_type: BetType::from_str(&bet_type),
        posted_line: row.get(10)?,
        posted_side: posted_side.as_deref().and_then(Side::from_str),
        closing_line: row.get(12)?,
        closing_odds: row.get(13)?,
    })
}

fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<ClosingSnapshot> {
    Ok(ClosingSnapshot {
        guild_id: row.get(0)?,
        event_key: row.get(1)?,
        closing_line: row.get(2)?,
        closing_odds: row.get(3)?,
        source: row.get(4)?,
        fetched_at: row.get(5)?,
    })
}

struct TicketRow {
    id: i64,
    bet_id: i64,
    guild_id: i64,
    payload: String,
    created_at: DateTime<Utc>,
    resolved: bool,
}

impl TicketRow {
    fn into_ticket(self) -> Result<DisambiguationTicket> {
        let candidates: Vec<String> = serde_json::from_str(&self.payload)?;
        Ok(DisambiguationTicket {
            id: self.id,
            bet_id: self.bet_id,
            guild_id: self.guild_id,
            candidates,
            created_at: self.created_at,
            resolved: self.resolved,
        })
    }
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<TicketRow> {
    let resolved: i64 = row.get(5)?;
    Ok(TicketRow {
        id: row.get(0)?,
        bet_id: row.get(1)?,
        guild_id: row.get(2)?,
        payload: row.get(3)?,
        created_at: row.get(4)?,
        resolved: resolved != 0,
    })
}

#[cfg(test)]
impl Store {
    /// Raw SQL escape hatch for tests that need to sabotage a table.
    pub(crate) fn execute_sql(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}
