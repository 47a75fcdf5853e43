//! Dynamic odds engine.
//!
//! Recomputes a game's 1X2 odds from the approved stake pool, blending a
//! pool-implied fair price with the opening odds as liquidity accumulates.
//! The house margin is fixed: the pool pays out at `1 − vigorish`.
//!
//! The engine is pure — it returns the next odds (or `None` for a no-op)
//! and the caller persists all three prices as one atomic update, so a
//! reader never observes a mix of old and new values.

use rust_decimal::Decimal;
use tracing::debug;

use super::pool::StakePool;
use super::OddsConfig;
use crate::types::{FullTimeOdds, FullTimeOutcome, Game, GameStatus};

pub struct OddsEngine {
    config: OddsConfig,
}

impl OddsEngine {
    pub fn new(config: OddsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OddsConfig {
        &self.config
    }

    /// Compute the next 1X2 odds for `game` given its stake pool.
    ///
    /// Returns `None` when there is nothing to do: the game is no longer
    /// open, or the pool is still below `starting_pool` (tiny pools would
    /// swing the prices wildly, so the odds hold at their last value —
    /// normally the opening odds). A `None` is a recoverable no-op, not
    /// an error.
    pub fn recompute(&self, game: &Game, pool: &StakePool) -> Option<FullTimeOdds> {
        if game.status != GameStatus::Open {
            return None;
        }
        if pool.total < self.config.starting_pool {
            debug!(
                game_id = %game.id,
                pool = %pool.total,
                starting_pool = %self.config.starting_pool,
                "Pool below starting threshold — odds hold"
            );
            return None;
        }

        // Linear decay of the anchor weight: 1 at an empty pool, 0 at or
        // beyond maturity.
        let weight = (Decimal::ONE - pool.total / self.config.maturity_pool).max(Decimal::ZERO);
        let payout_pool = pool.total * self.config.payout_rate();

        let mut next = game.odds.full_time;
        for outcome in FullTimeOutcome::ALL {
            // Floor at 1 so an outcome nobody backed doesn't divide by zero.
            let backed = pool.stake_on(*outcome).max(Decimal::ONE);
            let implied = payout_pool / backed;
            let anchor = game.initial_odds.full_time.price(*outcome);
            let blended = implied * (Decimal::ONE - weight) + anchor * weight;
            next.set_price(*outcome, self.config.clamp(blended));
        }

        debug!(
            game_id = %game.id,
            pool = %pool.total,
            weight = %weight,
            odds = %next,
            "Odds recomputed"
        );

        Some(next)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
