//! MATCHBOOK — parimutuel sports-betting backend
//!
//! Entry point. Loads configuration, initialises structured logging,
//! connects the store and the payment processor, and serves the API
//! with graceful shutdown.

use anyhow::Result;
use secrecy::Secret;
use std::sync::Arc;
use tracing::info;

use matchbook::betting::BetLimits;
use matchbook::config::AppConfig;
use matchbook::odds::OddsConfig;
use matchbook::payments::mercadopago::{MercadoPagoClient, MercadoPagoConfig};
use matchbook::server::{self, AppState};
use matchbook::store::sqlite::SqliteStore;

const BANNER: &str = r#"
 __  __    _  _____ ____ _   _ ____   ___   ___  _  __
|  \/  |  / \|_   _/ ___| | | | __ ) / _ \ / _ \| |/ /
| |\/| | / _ \ | || |   | |_| |  _ \| | | | | | | ' /
| |  | |/ ___ \| || |___|  _  | |_) | |_| | |_| | . \
|_|  |_/_/   \_\_| \____|_| |_|____/ \___/ \___/|_|\_\

  Parimutuel sports-betting backend
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    println!("{BANNER}");
    info!(
        port = cfg.server.port,
        public_url = %cfg.server.public_url,
        database_url = %cfg.store.database_url,
        "MATCHBOOK starting up"
    );

    // -- Odds engine tuning ----------------------------------------------

    let odds_config = OddsConfig {
        vigorish: cfg.odds.vigorish,
        min_odd: cfg.odds.min_odd,
        max_odd: cfg.odds.max_odd,
        starting_pool: cfg.odds.starting_pool,
        maturity_pool: cfg.odds.maturity_pool,
    };
    odds_config.validate()?;

    // -- Store -----------------------------------------------------------

    let store = Arc::new(SqliteStore::connect(&cfg.store.database_url).await?);

    // -- Payment processor -----------------------------------------------

    let access_token = AppConfig::resolve_env(&cfg.payments.access_token_env)?;
    let payments = Arc::new(MercadoPagoClient::new(
        Secret::new(access_token),
        MercadoPagoConfig {
            timeout_secs: cfg.payments.timeout_secs,
            success_url: cfg.payments.success_url.clone(),
            failure_url: cfg.payments.failure_url.clone(),
            notification_url: format!("{}/api/webhooks/payments", cfg.server.public_url),
        },
    )?);

    // -- Serve -----------------------------------------------------------

    let state = AppState::new(
        store,
        payments,
        odds_config,
        BetLimits {
            short_odds_threshold: cfg.limits.short_odds_threshold,
            short_odds_max_stake: cfg.limits.short_odds_max_stake,
        },
        cfg.limits.default_max_stake_per_user,
    );

    server::serve(state, cfg.server.port).await?;

    info!("MATCHBOOK shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("matchbook=info"));

    let json_logging = std::env::var("MATCHBOOK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
