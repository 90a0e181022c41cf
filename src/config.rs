use crate::model::Sport;
use anyhow::{Context, Result};
use tracing::warn;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub odds_api_key: String,
    pub tracked_sports: Vec<Sport>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "clv_tracker.db".to_string());

        let odds_api_key = std::env::var("ODDS_API_KEY")
            .context("ODDS_API_KEY must be set - closing odds cannot be fetched without it")?;

        let tracked_sports = match std::env::var("TRACKED_SPORTS") {
            Ok(raw) => {
                let sports: Vec<Sport> = raw
                    .split(',')
                    .map(|s| Sport::from_str(s.trim()))
                    .filter(|s| *s != Sport::Unknown)
                    .collect();
                if sports.is_empty() {
                    warn!("TRACKED_SPORTS parsed to nothing usable, using defaults");
                    Self::default_sports()
                } else {
                    sports
                }
            }
            Err(_) => Self::default_sports(),
        };

        Ok(Self {
            database_path,
            odds_api_key,
            tracked_sports,
        })
    }

    fn default_sports() -> Vec<Sport> {
        vec![
            Sport::Basketball,
            Sport::Football,
            Sport::Baseball,
            Sport::Hockey,
            Sport::Soccer,
        ]
    }
}
