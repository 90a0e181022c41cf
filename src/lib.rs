// Core modules
pub mod clv;
pub mod config;
pub mod disambiguation;
pub mod event_key;
pub mod ingest;
pub mod matcher;
pub mod model;
pub mod notify;
pub mod odds_feed;
pub mod parser;
pub mod scheduler;
pub mod store;

// Re-exports
pub use clv::{american_to_prob, calc_clv};
pub use config::Config;
pub use event_key::build_key;
pub use matcher::{ConsensusMatcher, MatchResult};
pub use model::{
    BetRecord, BetType, ClosingSnapshot, DisambiguationTicket, MatchCandidate, Outcome, ParsedBet,
    Side, Sport,
};
pub use notify::{LogNotifier, Notifier};
pub use odds_feed::{NormalizedClosing, OddsFeedClient};
pub use scheduler::{ReconcileSummary, ReconciliationScheduler};
pub use store::{Store, StoreError};
