//! Settlement engine.
//!
//! Runs when an admin finalizes a game: every approved bet with a
//! pending selection on that game gets those selections graded against
//! the recorded result, then its overall outcome falls out of the
//! selection statuses. Grading is best-effort per bet — one malformed
//! bet is logged and skipped, never aborting the rest of the pass.

pub mod report;

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::{Store, StoreError};
use crate::types::{
    Bet, BetOutcome, DomainError, GameResult, GameStatus, MarketPick, OverUnder, PaymentStatus,
    SelectionStatus, YesNo,
};

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

/// Grade one pick against a finalized game's result.
///
/// Exhaustive over market kinds: adding a market variant forces an arm
/// here before the crate compiles again. A result that doesn't carry
/// the slot a pick needs is a per-bet error, handled by the caller.
pub fn evaluate_pick(
    pick: &MarketPick,
    result: &GameResult,
) -> Result<SelectionStatus, DomainError> {
    match pick {
        MarketPick::FullTime { pick } => {
            let outcome = result.full_time.ok_or_else(|| DomainError::MissingResult {
                market: "1x2".to_string(),
            })?;
            Ok(if *pick == outcome {
                SelectionStatus::Won
            } else {
                SelectionStatus::Lost
            })
        }
        MarketPick::TotalGoals { line, pick } => {
            let goals = result.goals_total.ok_or_else(|| DomainError::MissingResult {
                market: "total_goals".to_string(),
            })?;
            let total = Decimal::from(goals);
            if total == *line {
                // Exact hit on an integer line pushes.
                return Ok(SelectionStatus::Void);
            }
            let won = match pick {
                OverUnder::Over => total > *line,
                OverUnder::Under => total < *line,
            };
            Ok(if won {
                SelectionStatus::Won
            } else {
                SelectionStatus::Lost
            })
        }
        MarketPick::BothTeamsScore { pick } => {
            let both = result.both_scored.ok_or_else(|| DomainError::MissingResult {
                market: "both_teams_score".to_string(),
            })?;
            let won = matches!((pick, both), (YesNo::Yes, true) | (YesNo::No, false));
            Ok(if won {
                SelectionStatus::Won
            } else {
                SelectionStatus::Lost
            })
        }
    }
}

/// Counters from one finalization pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SettlementSummary {
    pub bets_graded: usize,
    pub bets_skipped: usize,
    pub won: usize,
    pub lost: usize,
    pub still_open: usize,
}

pub struct SettlementEngine {
    store: Arc<dyn Store>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record the final result and grade every affected bet.
    pub async fn finalize_game(
        &self,
        game_id: &str,
        result: GameResult,
    ) -> Result<SettlementSummary, SettlementError> {
        let game = self
            .store
            .game(game_id)
            .await?
            .ok_or_else(|| DomainError::GameNotFound(game_id.to_string()))?;

        if !game.status.can_transition_to(GameStatus::Finalized) {
            return Err(DomainError::InvalidStatusTransition {
                game_id: game_id.to_string(),
                from: game.status,
                to: GameStatus::Finalized,
            }
            .into());
        }

        self.store
            .update_game_status(game_id, GameStatus::Finalized, Some(&result))
            .await?;
        info!(game_id, title = %game.title(), ?result, "Game finalized");

        let mut summary = SettlementSummary::default();

        for bet in self.store.bets_for_game(game_id).await? {
            if bet.payment_status != PaymentStatus::Approved {
                continue;
            }
            match self.grade_bet(&bet, game_id, &result).await {
                Ok(None) => {} // nothing pending on this game
                Ok(Some(outcome)) => {
                    summary.bets_graded += 1;
                    match outcome {
                        BetOutcome::Won => summary.won += 1,
                        BetOutcome::Lost => summary.lost += 1,
                        BetOutcome::Pending => summary.still_open += 1,
                    }
                }
                Err(e) => {
                    warn!(bet_id = %bet.id, error = %e, "Skipping bet during settlement");
                    summary.bets_skipped += 1;
                }
            }
        }

        info!(
            game_id,
            graded = summary.bets_graded,
            skipped = summary.bets_skipped,
            won = summary.won,
            lost = summary.lost,
            still_open = summary.still_open,
            "Settlement pass complete"
        );

        Ok(summary)
    }

    /// Grade the bet's pending selections on this game. Returns the
    /// bet's overall outcome after grading, or `None` when the bet had
    /// nothing pending here.
    async fn grade_bet(
        &self,
        bet: &Bet,
        game_id: &str,
        result: &GameResult,
    ) -> Result<Option<BetOutcome>, SettlementError> {
        let mut selections = bet.selections.clone();
        let mut touched = false;

        for selection in selections
            .iter_mut()
            .filter(|s| s.game_id == game_id && s.status == SelectionStatus::Pending)
        {
            selection.status = evaluate_pick(&selection.pick, result)?;
            touched = true;
        }

        if !touched {
            return Ok(None);
        }

        self.store
            .update_bet_selections(&bet.id, &selections)
            .await?;

        let graded = Bet {
            selections,
            ..bet.clone()
        };
        Ok(Some(graded.outcome()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
