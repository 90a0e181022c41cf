use crate::matcher::parse_candidate_label;
use crate::model::{DisambiguationTicket, MatchCandidate};
use crate::store::{Result, Store, StoreError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// How long a requested decision waits for exactly one reply. Timing out is
/// a normal terminal state: the ticket stays unresolved until re-initiated.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(180);

/// A human's answer to a posted candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketChoice {
    Index(usize),
    Skip,
}

impl TicketChoice {
    /// Parse a chat reply: "skip" or a 1-based candidate number.
    pub fn from_reply(reply: &str) -> Option<Self> {
        let reply = reply.trim().to_lowercase();
        if reply == "skip" {
            return Some(TicketChoice::Skip);
        }
        let n: usize = reply.parse().ok()?;
        if n == 0 {
            return None;
        }
        Some(TicketChoice::Index(n - 1))
    }
}

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// Closing data written to the bet, ticket marked resolved.
    Applied {
        bet_id: i64,
        closing_line: Option<f64>,
        closing_odds: Option<String>,
    },
    /// Nothing changed; the ticket can be re-initiated later.
    Skipped,
}

/// Queue a pending decision for a bet. No-op when an unresolved ticket for
/// the bet already exists: a pending decision is never overwritten.
pub fn enqueue(
    store: &Store,
    bet_id: i64,
    guild_id: i64,
    candidates: &[MatchCandidate],
) -> Result<Option<i64>> {
    let labels: Vec<String> = candidates.iter().map(|c| c.label.clone()).collect();
    let created = store.insert_ticket(bet_id, guild_id, &labels)?;
    if let Some(ticket_id) = created {
        info!(bet_id, ticket_id, n = labels.len(), "Queued disambiguation ticket");
    }
    Ok(created)
}

/// Oldest pending ticket for a scope, if any.
pub fn next_unresolved(store: &Store, guild_id: i64) -> Result<Option<DisambiguationTicket>> {
    store.oldest_unresolved_ticket(guild_id)
}

/// Apply a choice to a ticket. A valid index writes the chosen candidate's
/// closing data to the bet and resolves the ticket in one transaction; skip
/// changes nothing; an out-of-range index is an error and the ticket stays
/// unresolved.
pub fn resolve(store: &mut Store, ticket_id: i64, choice: TicketChoice) -> Result<ResolveOutcome> {
    let index = match choice {
        TicketChoice::Skip => return Ok(ResolveOutcome::Skipped),
        TicketChoice::Index(i) => i,
    };
    let ticket = store
        .get_ticket(ticket_id)?
        .filter(|t| !t.resolved)
        .ok_or(StoreError::TicketNotFound(ticket_id))?;
    let label = ticket
        .candidates
        .get(index)
        .ok_or(StoreError::BadCandidateIndex(index, ticket.candidates.len()))?;
    let (closing_line, closing_odds) = parse_candidate_label(label)
        .ok_or_else(|| StoreError::BadCandidateLabel(label.clone()))?;
    let bet_id = store.resolve_ticket(ticket_id, closing_line, closing_odds.as_deref())?;
    info!(ticket_id, bet_id, "Disambiguation ticket resolved");
    Ok(ResolveOutcome::Applied {
        bet_id,
        closing_line,
        closing_odds,
    })
}

/// Await exactly one reply for a posted candidate list. This is the entry
/// point for the chat command layer, which posts the candidates, funnels
/// channel replies into `replies`, and waits [`REPLY_TIMEOUT`] by default;
/// the transport itself stays a black box and the correlation is the
/// channel. `None` on timeout or a reply that parses to no choice.
pub async fn await_choice(
    replies: &mut mpsc::Receiver<String>,
    timeout: Duration,
) -> Option<TicketChoice> {
    match tokio::time::timeout(timeout, replies.recv()).await {
        Ok(Some(reply)) => TicketChoice::from_reply(&reply),
        Ok(None) | Err(_) => None,
    }
}
