//! Reconciliation and reporting.
//!
//! Read-side aggregation of settled bets into the numbers the admin
//! acts on: what the house collected, what it still owes, what it has
//! already paid out, and a per-punter breakdown for processing PIX
//! payouts. Marking a punter paid is the only mutation here, and it is
//! idempotent by construction (one-way pending → paid).

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::SettlementError;
use crate::store::Store;
use crate::types::{Bet, BetOutcome, PaymentStatus, PayoutStatus, Punter};

// ---------------------------------------------------------------------------
// Financial report
// ---------------------------------------------------------------------------

/// House-level totals over a set of bets. Refunded bets are excluded
/// from every bucket: their stake went back to the punter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FinancialReport {
    /// Stakes on lost bets — money the house keeps.
    pub collected: Decimal,
    /// Potential payouts on won bets not yet paid out.
    pub owed: Decimal,
    /// Potential payouts on won bets already discharged.
    pub paid: Decimal,
    /// collected − (owed + paid).
    pub balance: Decimal,
    pub bets_considered: usize,
}

impl FinancialReport {
    pub fn build(bets: &[Bet]) -> Self {
        let mut report = FinancialReport::default();

        for bet in bets {
            if bet.payment_status != PaymentStatus::Approved {
                continue;
            }
            report.bets_considered += 1;
            match bet.outcome() {
                BetOutcome::Lost => report.collected += bet.stake,
                BetOutcome::Won => match bet.payout_status {
                    PayoutStatus::Pending => report.owed += bet.potential_payout,
                    PayoutStatus::Paid => report.paid += bet.potential_payout,
                },
                BetOutcome::Pending => {}
            }
        }

        report.balance = report.collected - (report.owed + report.paid);
        report
    }
}

// ---------------------------------------------------------------------------
// Per-punter payouts
// ---------------------------------------------------------------------------

/// Outstanding winnings grouped by punter, for operational payout runs.
#[derive(Debug, Clone, Serialize)]
pub struct PunterPayout {
    pub punter: Punter,
    pub total_owed: Decimal,
    pub bet_ids: Vec<String>,
}

/// Group owed amounts by PIX key, largest first.
pub fn payout_summary(bets: &[Bet]) -> Vec<PunterPayout> {
    let mut payouts: Vec<PunterPayout> = Vec::new();

    for bet in bets {
        let owed = bet.payment_status == PaymentStatus::Approved
            && bet.outcome() == BetOutcome::Won
            && bet.payout_status == PayoutStatus::Pending;
        if !owed {
            continue;
        }

        match payouts
            .iter_mut()
            .find(|p| p.punter.pix_key == bet.punter.pix_key)
        {
            Some(entry) => {
                entry.total_owed += bet.potential_payout;
                entry.bet_ids.push(bet.id.clone());
            }
            None => payouts.push(PunterPayout {
                punter: bet.punter.clone(),
                total_owed: bet.potential_payout,
                bet_ids: vec![bet.id.clone()],
            }),
        }
    }

    payouts.sort_by(|a, b| b.total_owed.cmp(&a.total_owed));
    payouts
}

// ---------------------------------------------------------------------------
// Mark paid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct MarkPaidSummary {
    pub bets_paid: usize,
    pub total: Decimal,
}

/// Discharge every outstanding won bet for one punter.
///
/// Each bet flips pending → paid independently; because the filter only
/// picks up pending payouts, an interrupted run can simply be retried —
/// already-flipped bets drop out and nothing is paid twice.
pub async fn mark_user_paid(
    store: &Arc<dyn Store>,
    pix_key: &str,
) -> Result<MarkPaidSummary, SettlementError> {
    let mut summary = MarkPaidSummary::default();

    for bet in store.bets_for_punter(pix_key).await? {
        let owed = bet.payment_status == PaymentStatus::Approved
            && bet.outcome() == BetOutcome::Won
            && bet.payout_status == PayoutStatus::Pending;
        if !owed {
            continue;
        }

        store
            .update_bet_payout_status(&bet.id, PayoutStatus::Paid)
            .await?;
        summary.bets_paid += 1;
        summary.total += bet.potential_payout;
    }

    info!(
        pix_key,
        bets_paid = summary.bets_paid,
        total = %summary.total,
        "Punter payouts discharged"
    );

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
