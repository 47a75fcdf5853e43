//! Odds model and pricing.
//!
//! Defines the tunable odds constants, the validated manual-edit operation
//! used by the admin surface, and the submodules:
//! - `pool` — aggregates approved stakes into a per-outcome pool
//! - `engine` — recomputes odds from the pool (blend + clamp)

pub mod engine;
pub mod pool;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::types::{DomainError, GameOdds, MarketPick, OverUnder, YesNo};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable constants for odds computation. Deployment values come from
/// `config.toml`; the defaults here match the reference deployment.
#[derive(Debug, Clone)]
pub struct OddsConfig {
    /// Fraction of the pool retained as margin. Payout rate = 1 − vigorish.
    pub vigorish: Decimal,
    pub min_odd: Decimal,
    pub max_odd: Decimal,
    /// Minimum total pool before the engine recomputes at all.
    pub starting_pool: Decimal,
    /// Pool size at which the blend is 100% pool-implied.
    pub maturity_pool: Decimal,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            vigorish: dec!(0.10),
            min_odd: dec!(1.01),
            max_odd: dec!(4.0),
            starting_pool: dec!(60),
            maturity_pool: dec!(400),
        }
    }
}

impl OddsConfig {
    /// Reject nonsensical tunings up front instead of producing quiet
    /// garbage odds at runtime.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.vigorish <= Decimal::ZERO || self.vigorish >= Decimal::ONE {
            return Err(DomainError::Config(format!(
                "vigorish must be in (0, 1), got {}",
                self.vigorish
            )));
        }
        if self.min_odd < Decimal::ONE || self.min_odd >= self.max_odd {
            return Err(DomainError::Config(format!(
                "odd bounds invalid: min {} max {}",
                self.min_odd, self.max_odd
            )));
        }
        if self.starting_pool < Decimal::ZERO || self.starting_pool > self.maturity_pool {
            return Err(DomainError::Config(format!(
                "pool thresholds invalid: starting {} maturity {}",
                self.starting_pool, self.maturity_pool
            )));
        }
        Ok(())
    }

    pub fn payout_rate(&self) -> Decimal {
        Decimal::ONE - self.vigorish
    }

    pub fn clamp(&self, value: Decimal) -> Decimal {
        value.max(self.min_odd).min(self.max_odd)
    }

    fn check_range(&self, value: Decimal) -> Result<(), DomainError> {
        if value < self.min_odd || value > self.max_odd {
            return Err(DomainError::OddsOutOfRange {
                value,
                min: self.min_odd,
                max: self.max_odd,
            });
        }
        Ok(())
    }
}

/// Validate every price on a board, e.g. the opening odds an admin
/// submits at game creation. Rejects out-of-range values like any other
/// manual write.
pub fn validate_board(board: &GameOdds, config: &OddsConfig) -> Result<(), DomainError> {
    let mut prices = vec![
        board.full_time.home,
        board.full_time.draw,
        board.full_time.away,
    ];
    if let Some(t) = &board.total_goals {
        prices.push(t.over);
        prices.push(t.under);
    }
    if let Some(b) = &board.both_teams_score {
        prices.push(b.yes);
        prices.push(b.no);
    }
    for price in prices {
        config.check_range(price)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Manual odds edits
// ---------------------------------------------------------------------------

/// An admin's "set current odds for outcome X to value V" operation.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualOddsEdit {
    #[serde(flatten)]
    pub pick: MarketPick,
    pub value: Decimal,
}

/// Apply a manual edit to a game's odds board.
///
/// Unlike the automatic engine, manual writes reject out-of-range values
/// instead of clamping: a human typing 40 where they meant 4.0 is a
/// configuration error, not a price to be silently adjusted.
pub fn apply_manual_edit(
    game_id: &str,
    odds: &mut GameOdds,
    edit: &ManualOddsEdit,
    config: &OddsConfig,
) -> Result<(), DomainError> {
    config.check_range(edit.value)?;

    match &edit.pick {
        MarketPick::FullTime { pick } => {
            odds.full_time.set_price(*pick, edit.value);
        }
        MarketPick::TotalGoals { line, pick } => {
            let totals = odds
                .total_goals
                .as_mut()
                .filter(|t| t.line == *line)
                .ok_or_else(|| DomainError::UnknownMarket {
                    game_id: game_id.to_string(),
                    market: format!("{}", edit.pick),
                })?;
            match pick {
                OverUnder::Over => totals.over = edit.value,
                OverUnder::Under => totals.under = edit.value,
            }
        }
        MarketPick::BothTeamsScore { pick } => {
            let btts = odds.both_teams_score.as_mut().ok_or_else(|| {
                DomainError::UnknownMarket {
                    game_id: game_id.to_string(),
                    market: format!("{}", edit.pick),
                }
            })?;
            match pick {
                YesNo::Yes => btts.yes = edit.value,
                YesNo::No => btts.no = edit.value,
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FullTimeOdds, FullTimeOutcome, TotalsOdds};

    fn board() -> GameOdds {
        GameOdds {
            full_time: FullTimeOdds {
                home: dec!(1.5),
                draw: dec!(3.0),
                away: dec!(2.5),
            },
            total_goals: Some(TotalsOdds {
                line: dec!(2.5),
                over: dec!(1.8),
                under: dec!(1.9),
            }),
            both_teams_score: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(OddsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_vigorish() {
        let cfg = OddsConfig {
            vigorish: dec!(1.5),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let cfg = OddsConfig {
            min_odd: dec!(4.0),
            max_odd: dec!(1.01),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_starting_above_maturity() {
        let cfg = OddsConfig {
            starting_pool: dec!(500),
            maturity_pool: dec!(400),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_payout_rate() {
        assert_eq!(OddsConfig::default().payout_rate(), dec!(0.90));
    }

    #[test]
    fn test_clamp() {
        let cfg = OddsConfig::default();
        assert_eq!(cfg.clamp(dec!(0.5)), dec!(1.01));
        assert_eq!(cfg.clamp(dec!(10)), dec!(4.0));
        assert_eq!(cfg.clamp(dec!(2.2)), dec!(2.2));
    }

    #[test]
    fn test_manual_edit_sets_full_time_price() {
        let mut odds = board();
        let edit = ManualOddsEdit {
            pick: MarketPick::FullTime {
                pick: FullTimeOutcome::Draw,
            },
            value: dec!(3.4),
        };
        apply_manual_edit("g1", &mut odds, &edit, &OddsConfig::default()).unwrap();
        assert_eq!(odds.full_time.draw, dec!(3.4));
        // Other outcomes untouched.
        assert_eq!(odds.full_time.home, dec!(1.5));
    }

    #[test]
    fn test_manual_edit_rejects_out_of_range() {
        let mut odds = board();
        let edit = ManualOddsEdit {
            pick: MarketPick::FullTime {
                pick: FullTimeOutcome::Home,
            },
            value: dec!(40),
        };
        let err = apply_manual_edit("g1", &mut odds, &edit, &OddsConfig::default()).unwrap_err();
        assert!(matches!(err, DomainError::OddsOutOfRange { .. }));
        // Board unchanged on rejection.
        assert_eq!(odds.full_time.home, dec!(1.5));
    }

    #[test]
    fn test_manual_edit_totals_line_must_match() {
        let mut odds = board();
        let edit = ManualOddsEdit {
            pick: MarketPick::TotalGoals {
                line: dec!(3.5),
                pick: OverUnder::Over,
            },
            value: dec!(2.0),
        };
        let err = apply_manual_edit("g1", &mut odds, &edit, &OddsConfig::default()).unwrap_err();
        assert!(matches!(err, DomainError::UnknownMarket { .. }));
    }

    #[test]
    fn test_validate_board_accepts_in_range_prices() {
        assert!(validate_board(&board(), &OddsConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_board_rejects_any_out_of_range_price() {
        let mut odds = board();
        odds.total_goals.as_mut().unwrap().under = dec!(0.9);
        let err = validate_board(&odds, &OddsConfig::default()).unwrap_err();
        assert!(matches!(err, DomainError::OddsOutOfRange { .. }));
    }

    #[test]
    fn test_manual_edit_missing_market() {
        let mut odds = board();
        let edit = ManualOddsEdit {
            pick: MarketPick::BothTeamsScore { pick: YesNo::Yes },
            value: dec!(1.8),
        };
        let err = apply_manual_edit("g1", &mut odds, &edit, &OddsConfig::default()).unwrap_err();
        assert!(matches!(err, DomainError::UnknownMarket { .. }));
    }
}
