//! Stake aggregation.
//!
//! Computes the per-outcome pool of approved stakes for one game.
//! Read-only and side-effect-free: callers pass in whatever snapshot of
//! bets the persistence layer gave them, and consistency comes from that
//! snapshot, not from anything done here.

use rust_decimal::Decimal;

use crate::types::{Bet, FullTimeOutcome, MarketPick, PaymentStatus};

/// Approved stake totals for a game's primary (1X2) market.
///
/// Only single-leg bets feed this pool. Multi-leg ticket stakes span
/// several games and markets and are deliberately excluded — pooling
/// semantics for them were never defined, so they must not contaminate
/// the primary market. This is a documented boundary, not an oversight.
#[derive(Debug, Clone, PartialEq)]
pub struct StakePool {
    pub game_id: String,
    pub home: Decimal,
    pub draw: Decimal,
    pub away: Decimal,
    /// Grand total of all stakes counted into this pool.
    pub total: Decimal,
}

impl StakePool {
    /// Aggregate the approved single-leg 1X2 stakes for `game_id`.
    pub fn aggregate(game_id: &str, bets: &[Bet]) -> StakePool {
        let mut pool = StakePool {
            game_id: game_id.to_string(),
            home: Decimal::ZERO,
            draw: Decimal::ZERO,
            away: Decimal::ZERO,
            total: Decimal::ZERO,
        };

        for bet in bets {
            if bet.payment_status != PaymentStatus::Approved || !bet.is_single() {
                continue;
            }
            let selection = &bet.selections[0];
            if selection.game_id != game_id {
                continue;
            }
            let MarketPick::FullTime { pick } = &selection.pick else {
                continue;
            };
            match pick {
                FullTimeOutcome::Home => pool.home += bet.stake,
                FullTimeOutcome::Draw => pool.draw += bet.stake,
                FullTimeOutcome::Away => pool.away += bet.stake,
            }
            pool.total += bet.stake;
        }

        pool
    }

    pub fn stake_on(&self, outcome: FullTimeOutcome) -> Decimal {
        match outcome {
            FullTimeOutcome::Home => self.home,
            FullTimeOutcome::Draw => self.draw,
            FullTimeOutcome::Away => self.away,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
