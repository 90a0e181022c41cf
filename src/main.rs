use anyhow::Result;
use clv_tracker::{
    Config, LogNotifier, OddsFeedClient, ReconciliationScheduler, Store,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into())),
        )
        .init();

    let run_id = uuid::Uuid::new_v4();
    info!(%run_id, "Starting CLV tracker");

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    info!(
        "Tracking {} sport(s), store at {}",
        config.tracked_sports.len(),
        config.database_path
    );

    let store = Arc::new(Mutex::new(Store::open(&config.database_path)?));
    let feed = Arc::new(OddsFeedClient::new(config.odds_api_key.clone()));

    let scheduler = ReconciliationScheduler::new(
        store.clone(),
        LogNotifier,
        config.tracked_sports.clone(),
    );

    let fetch = {
        let feed = feed.clone();
        move |sport| {
            let feed = feed.clone();
            async move { feed.fetch_closings(sport).await }
        }
    };

    info!("Scheduler armed (twice weekly); Ctrl-C to stop");
    tokio::select! {
        _ = scheduler.run_forever(fetch) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested, stopping scheduler");
        }
    }

    Ok(())
}
