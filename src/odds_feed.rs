use crate::event_key::build_key;
use crate::model::{BetType, Sport};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// Feed sport keys for each tracked sport.
pub const SPORT_API_MAP: &[(Sport, &str)] = &[
    (Sport::Basketball, "basketball_nba"),
    (Sport::Football, "americanfootball_nfl"),
    (Sport::Baseball, "baseball_mlb"),
    (Sport::Hockey, "icehockey_nhl"),
    (Sport::Soccer, "soccer_usa_mls"),
    (Sport::Mma, "mma_mixed_martial_arts"),
];

const MARKETS: &str = "spreads,totals,h2h,player_points,player_rebounds,player_assists";

/// One market data point from the feed, already keyed the same way bets are.
#[derive(Debug, Clone)]
pub struct NormalizedClosing {
    pub event_key: String,
    pub closing_line: Option<f64>,
    pub closing_odds: Option<String>,
    pub source: String,
}

#[derive(Debug, Deserialize)]
struct FeedGame {
    home_team: String,
    away_team: String,
    commence_time: String,
    #[serde(default)]
    bookmakers: Vec<FeedBookmaker>,
}

#[derive(Debug, Deserialize)]
struct FeedBookmaker {
    title: String,
    #[serde(default)]
    markets: Vec<FeedMarket>,
}

#[derive(Debug, Deserialize)]
struct FeedMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<FeedOutcome>,
}

#[derive(Debug, Deserialize)]
struct FeedOutcome {
    name: String,
    description: Option<String>,
    point: Option<f64>,
    price: Option<f64>,
}

/// Client for The Odds API. Transport only: auth is a query-string key,
/// payloads are normalized into event-keyed rows for the snapshot cache.
pub struct OddsFeedClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OddsFeedClient {
    pub fn new(api_key: String) -> Self {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            api_key,
            base_url: "https://api.the-odds-api.com/v4".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch current odds for one sport and normalize every bookmaker
    /// outcome into an event-keyed closing row.
    pub async fn fetch_closings(&self, sport: Sport) -> Result<Vec<NormalizedClosing>> {
        let Some((_, api_key_name)) = SPORT_API_MAP.iter().find(|(s, _)| *s == sport) else {
            debug!(sport = sport.as_str(), "No feed mapping for sport, skipping");
            return Ok(Vec::new());
        };

        let url = format!("{}/sports/{}/odds/", self.base_url, api_key_name);
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("regions", "us"),
                ("markets", MARKETS),
                ("oddsFormat", "american"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch odds feed")?
            .error_for_status()
            .context("Odds feed returned an error status")?;

        let games: Vec<FeedGame> = response
            .json()
            .await
            .context("Failed to parse odds feed response")?;

        let mut rows = Vec::new();
        for game in games {
            let Some(date) = parse_commence_date(&game.commence_time) else {
                warn!(commence_time = %game.commence_time, "Unparseable commence time, skipping game");
                continue;
            };
            normalize_game(sport, date, &game, &mut rows);
        }
        Ok(rows)
    }
}

fn parse_commence_date(commence_time: &str) -> Option<NaiveDate> {
    commence_time.get(..10)?.parse().ok()
}

fn normalize_game(sport: Sport, date: NaiveDate, game: &FeedGame, out: &mut Vec<NormalizedClosing>) {
    let teams_text = format!("{} {}", game.home_team, game.away_team);
    for bookmaker in &game.bookmakers {
        for market in &bookmaker.markets {
            let (bet_type, per_outcome_text): (BetType, bool) = match market.key.as_str() {
                "spreads" => (BetType::Spread, true),
                "totals" => (BetType::Total, false),
                "h2h" => (BetType::Moneyline, true),
                k if k.starts_with("player_") => (BetType::Prop, true),
                _ => continue,
            };
            for outcome in &market.outcomes {
                let text = if bet_type == BetType::Prop {
                    outcome.description.as_deref().unwrap_or(&outcome.name)
                } else if per_outcome_text {
                    outcome.name.as_str()
                } else {
                    teams_text.as_str()
                };
                out.push(NormalizedClosing {
                    event_key: build_key(text, sport, date, bet_type),
                    closing_line: outcome.point,
                    closing_odds: outcome.price.map(format_american),
                    source: bookmaker.title.clone(),
                });
            }
        }
    }
}

/// Render a feed price as American-odds notation ("+150", "-110").
fn format_american(price: f64) -> String {
    let rounded = price.round() as i64;
    if rounded > 0 {
        format!("+{rounded}")
    } else {
        rounded.to_string()
    }
}
