//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the payment-processor access token) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub payments: PaymentsConfig,
    pub store: StoreConfig,
    pub odds: OddsTuning,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Externally reachable base URL, used to build the webhook
    /// notification URL handed to the payment processor.
    pub public_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    pub access_token_env: String,
    pub timeout_secs: u64,
    /// Where the hosted checkout redirects the punter afterwards.
    pub success_url: String,
    pub failure_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite connection string, e.g. "sqlite://matchbook.db?mode=rwc".
    pub database_url: String,
}

/// Tunable constants for the dynamic odds engine.
#[derive(Debug, Deserialize, Clone)]
pub struct OddsTuning {
    /// Fraction of the pool retained as margin (payout rate = 1 − vig).
    pub vigorish: Decimal,
    pub min_odd: Decimal,
    pub max_odd: Decimal,
    /// Below this total pool, odds stay at their last value.
    pub starting_pool: Decimal,
    /// At or above this total pool the blend is 100% pool-implied.
    pub maturity_pool: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Default per-game stake ceiling when game creation omits one.
    pub default_max_stake_per_user: Decimal,
    /// Selections priced below this reject stakes above the cap.
    pub short_odds_threshold: Decimal,
    pub short_odds_max_stake: Decimal,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
