//! Bet lifecycle.
//!
//! The ticket desk turns an incoming bet request into a hosted-checkout
//! session: it validates the ticket against every referenced game,
//! freezes the quoted odds, and hands the full draft to the payment
//! processor as preference metadata. Nothing is persisted here — a bet
//! only exists once its first confirmation webhook lands (see `webhook`),
//! so a failed or abandoned checkout leaves no orphaned rows.

pub mod webhook;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::payments::{PaymentError, PaymentProvider, PreferenceRequest};
use crate::store::{Store, StoreError};
use crate::types::{
    Bet, DomainError, GameStatus, MarketPick, PaymentStatus, PayoutStatus, Punter, Selection,
    SelectionStatus,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BettingError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Payment provider failure: {0}")]
    Payment(#[from] PaymentError),
}

// ---------------------------------------------------------------------------
// Request / draft types
// ---------------------------------------------------------------------------

/// Incoming bet request (`POST /api/bets` body).
#[derive(Debug, Clone, Deserialize)]
pub struct TicketRequest {
    pub selections: Vec<SelectionRequest>,
    pub stake: Decimal,
    pub punter: Punter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionRequest {
    pub game_id: String,
    #[serde(flatten)]
    pub pick: MarketPick,
}

/// Everything needed to reconstruct the bet when the confirmation
/// webhook arrives. Serialized into the payment preference metadata so
/// the punter gets exactly the odds quoted here, no matter how far the
/// live odds have moved by confirmation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetDraft {
    pub draft_id: String,
    pub selections: Vec<Selection>,
    pub price: Decimal,
    pub stake: Decimal,
    pub potential_payout: Decimal,
    pub punter: Punter,
    pub quoted_at: DateTime<Utc>,
}

impl BetDraft {
    /// Materialize the draft as an approved bet carrying the payment id
    /// that confirmed it.
    pub fn into_bet(self, payment_ref: String) -> Bet {
        Bet {
            id: self.draft_id,
            selections: self.selections,
            price: self.price,
            stake: self.stake,
            potential_payout: self.potential_payout,
            punter: self.punter,
            placed_at: self.quoted_at,
            payment_status: PaymentStatus::Approved,
            payout_status: PayoutStatus::Pending,
            payment_ref: Some(payment_ref),
        }
    }
}

/// What the caller gets back: the processor's checkout URL plus the
/// quoted numbers, so the front-end can show them before redirecting.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub draft_id: String,
    pub init_point: String,
    pub price: Decimal,
    pub potential_payout: Decimal,
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Exposure limits applied at quote time.
#[derive(Debug, Clone)]
pub struct BetLimits {
    /// Selections priced below this threshold reject large stakes, to
    /// cap house exposure on near-certain outcomes.
    pub short_odds_threshold: Decimal,
    pub short_odds_max_stake: Decimal,
}

impl Default for BetLimits {
    fn default() -> Self {
        Self {
            short_odds_threshold: dec!(1.30),
            short_odds_max_stake: dec!(100),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticket desk
// ---------------------------------------------------------------------------

pub struct TicketDesk {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentProvider>,
    limits: BetLimits,
}

impl TicketDesk {
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentProvider>,
        limits: BetLimits,
    ) -> Self {
        Self {
            store,
            payments,
            limits,
        }
    }

    /// Validate a ticket, freeze its odds, and open a checkout session.
    pub async fn place(&self, request: TicketRequest) -> Result<CheckoutSession, BettingError> {
        if request.selections.is_empty() {
            return Err(DomainError::EmptyTicket.into());
        }
        if request.stake <= Decimal::ZERO {
            return Err(DomainError::InvalidStake(request.stake).into());
        }

        let mut selections = Vec::with_capacity(request.selections.len());
        let mut titles = Vec::new();

        for sel in &request.selections {
            let game = self
                .store
                .game(&sel.game_id)
                .await?
                .ok_or_else(|| DomainError::GameNotFound(sel.game_id.clone()))?;

            if game.status != GameStatus::Open {
                return Err(DomainError::GameNotOpen {
                    game_id: game.id,
                    status: game.status,
                }
                .into());
            }

            let odds = game.odds.price_for(&sel.pick).ok_or_else(|| {
                DomainError::UnknownMarket {
                    game_id: game.id.clone(),
                    market: format!("{}", sel.pick),
                }
            })?;

            self.check_stake_limit(&game.id, game.max_stake_per_user, &request)
                .await?;

            titles.push(game.title());
            selections.push(Selection {
                game_id: sel.game_id.clone(),
                pick: sel.pick.clone(),
                odds,
                status: SelectionStatus::Pending,
            });
        }

        if request.stake > self.limits.short_odds_max_stake {
            if let Some(short) = selections
                .iter()
                .find(|s| s.odds < self.limits.short_odds_threshold)
            {
                return Err(DomainError::ShortOddsStakeCapped {
                    odds: short.odds,
                    threshold: self.limits.short_odds_threshold,
                    max_stake: self.limits.short_odds_max_stake,
                }
                .into());
            }
        }

        let price: Decimal = selections.iter().map(|s| s.odds).product();
        let potential_payout = request.stake * price;

        let draft = BetDraft {
            draft_id: uuid::Uuid::new_v4().to_string(),
            selections,
            price,
            stake: request.stake,
            potential_payout,
            punter: request.punter,
            quoted_at: Utc::now(),
        };

        let (title, description) = describe_ticket(&draft, &titles);
        let metadata = serde_json::to_value(&draft).map_err(StoreError::from)?;

        let preference = self
            .payments
            .create_preference(&PreferenceRequest {
                title,
                description,
                unit_price: draft.stake,
                external_reference: draft.draft_id.clone(),
                metadata,
            })
            .await?;

        info!(
            draft_id = %draft.draft_id,
            punter = %draft.punter.name,
            stake = %draft.stake,
            price = %draft.price,
            legs = draft.selections.len(),
            "Checkout session opened"
        );

        Ok(CheckoutSession {
            draft_id: draft.draft_id,
            init_point: preference.init_point,
            price,
            potential_payout,
        })
    }

    /// Enforce the per-punter stake ceiling on one game: existing
    /// approved stake plus the new stake must stay within the game's
    /// limit. The error carries the remaining allowance.
    async fn check_stake_limit(
        &self,
        game_id: &str,
        limit: Decimal,
        request: &TicketRequest,
    ) -> Result<(), BettingError> {
        let existing: Decimal = self
            .store
            .bets_for_punter(&request.punter.pix_key)
            .await?
            .iter()
            .filter(|b| {
                b.payment_status == PaymentStatus::Approved && b.references_game(game_id)
            })
            .map(|b| b.stake)
            .sum();

        if existing + request.stake > limit {
            return Err(DomainError::StakeLimitExceeded {
                game_id: game_id.to_string(),
                limit,
                existing,
                remaining: (limit - existing).max(Decimal::ZERO),
            }
            .into());
        }
        Ok(())
    }
}

/// Checkout item title and description, in the shape the original
/// storefront shows: "Aposta no jogo: ..." / "Palpite: ...".
fn describe_ticket(draft: &BetDraft, titles: &[String]) -> (String, String) {
    if draft.selections.len() == 1 {
        let title = format!("Aposta no jogo: {}", titles[0]);
        let description = format!("Palpite: {}", draft.selections[0].pick);
        (title, description)
    } else {
        let title = format!("Aposta múltipla ({} seleções)", draft.selections.len());
        let picks: Vec<String> = draft
            .selections
            .iter()
            .zip(titles)
            .map(|(s, t)| format!("{t}: {}", s.pick))
            .collect();
        (title, format!("Palpites: {}", picks.join(" | ")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
