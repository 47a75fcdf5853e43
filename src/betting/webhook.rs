//! Idempotent webhook ingestion.
//!
//! The payment processor delivers payment-event notifications at least
//! once, redelivering until it sees a 2xx. The handler therefore has to
//! be safe to replay: the first approved notification materializes the
//! bet (from the draft carried in the payment metadata) and nudges the
//! odds engine; every later delivery of the same payment is a no-op.
//! Deduplication rests on the store's payment-reference uniqueness
//! constraint, not on in-process locking.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{BetDraft, BettingError};
use crate::odds::engine::OddsEngine;
use crate::odds::pool::StakePool;
use crate::payments::{PaymentDetails, PaymentProvider, PaymentState};
use crate::store::{InsertOutcome, Store};
use crate::types::{Bet, PaymentStatus};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The notification body the processor POSTs to us. Only payment events
/// matter; everything else is acknowledged and dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub id: PaymentId,
}

/// The processor is inconsistent about whether `data.id` is a string or
/// a number; accept both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PaymentId {
    Text(String),
    Number(u64),
}

impl PaymentId {
    pub fn as_string(&self) -> String {
        match self {
            PaymentId::Text(s) => s.clone(),
            PaymentId::Number(n) => n.to_string(),
        }
    }
}

impl WebhookEvent {
    /// The payment id this event refers to, if it is a payment event.
    fn payment_id(&self) -> Option<String> {
        let is_payment = self.kind.as_deref() == Some("payment")
            || self
                .action
                .as_deref()
                .is_some_and(|a| a.starts_with("payment."));
        if !is_payment {
            return None;
        }
        self.data.as_ref().map(|d| d.id.as_string())
    }
}

/// What ingestion did with an event. All variants are acknowledged with
/// a 2xx — only transport/store failures bubble up as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First confirmation: bet persisted, odds recomputed.
    Approved,
    /// Same payment reference seen before — replay, nothing changed.
    Duplicate,
    /// An approved payment was reversed; the bet is now refunded.
    Refunded,
    /// Not a payment event, not an actionable status, or not our payment.
    Ignored,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct WebhookHandler {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentProvider>,
    engine: OddsEngine,
}

impl WebhookHandler {
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentProvider>,
        engine: OddsEngine,
    ) -> Self {
        Self {
            store,
            payments,
            engine,
        }
    }

    /// Process one notification.
    ///
    /// Errors are retryable by contract: a failure fetching the payment
    /// or writing the bet leaves no partial state behind (the insert is
    /// idempotent on the payment reference), so the caller returns a
    /// non-2xx and the processor redelivers.
    pub async fn ingest(&self, event: &WebhookEvent) -> Result<IngestOutcome, BettingError> {
        let Some(payment_id) = event.payment_id() else {
            return Ok(IngestOutcome::Ignored);
        };

        let payment = self.payments.fetch_payment(&payment_id).await?;

        if payment.status == PaymentState::Approved {
            return self.apply_approval(payment).await;
        }
        if payment.status.is_reversal() {
            return self.apply_reversal(&payment.id).await;
        }

        info!(payment_id = %payment.id, status = ?payment.status, "Payment not actionable yet");
        Ok(IngestOutcome::Ignored)
    }

    async fn apply_approval(&self, payment: PaymentDetails) -> Result<IngestOutcome, BettingError> {
        // The draft travels through the processor as metadata. It is
        // third-party input by the time it comes back, so it gets
        // schema-checked here; a payment without a parseable draft is
        // not one of ours.
        let draft: BetDraft = match serde_json::from_value(payment.metadata.clone()) {
            Ok(draft) => draft,
            Err(e) => {
                warn!(
                    payment_id = %payment.id,
                    error = %e,
                    "Approved payment without a valid bet draft — ignoring"
                );
                return Ok(IngestOutcome::Ignored);
            }
        };

        let bet = draft.into_bet(payment.id.clone());

        match self.store.insert_bet_if_absent(&bet).await? {
            InsertOutcome::DuplicateReference => {
                info!(payment_id = %payment.id, "Duplicate confirmation — no-op");
                Ok(IngestOutcome::Duplicate)
            }
            InsertOutcome::Inserted => {
                info!(
                    bet_id = %bet.id,
                    payment_id = %payment.id,
                    stake = %bet.stake,
                    "Bet confirmed"
                );
                self.recompute_games(&bet).await;
                Ok(IngestOutcome::Approved)
            }
        }
    }

    async fn apply_reversal(&self, payment_ref: &str) -> Result<IngestOutcome, BettingError> {
        let Some(bet) = self.store.bet_by_payment_ref(payment_ref).await? else {
            return Ok(IngestOutcome::Ignored);
        };
        if bet.payment_status != PaymentStatus::Approved {
            // Already refunded — replayed reversal, nothing to do.
            return Ok(IngestOutcome::Ignored);
        }

        self.store
            .update_bet_payment_status(&bet.id, PaymentStatus::Refunded)
            .await?;
        info!(bet_id = %bet.id, payment_ref, "Bet refunded");

        self.recompute_games(&bet).await;
        Ok(IngestOutcome::Refunded)
    }

    /// Recompute odds for every game the bet touches. Best-effort: the
    /// payment is already recorded, and a stale or failed write here is
    /// self-correcting on the next trigger for the same game.
    async fn recompute_games(&self, bet: &Bet) {
        let recomputes = bet
            .game_ids()
            .into_iter()
            .map(|game_id| self.recompute_game(game_id));
        futures::future::join_all(recomputes).await;
    }

    async fn recompute_game(&self, game_id: String) {
        let result: Result<(), BettingError> = async {
            let Some(game) = self.store.game(&game_id).await? else {
                return Ok(());
            };
            let bets = self.store.bets_for_game(&game_id).await?;
            let pool = StakePool::aggregate(&game_id, &bets);
            if let Some(full_time) = self.engine.recompute(&game, &pool) {
                let mut odds = game.odds.clone();
                odds.full_time = full_time;
                self.store.update_game_odds(&game_id, &odds).await?;
                info!(game_id = %game_id, pool = %pool.total, odds = %full_time, "Odds updated");
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!(game_id = %game_id, error = %e, "Odds recompute failed — will self-correct");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::BetDraft;
    use crate::odds::OddsConfig;
    use crate::payments::{MockPaymentProvider, PaymentError, PaymentState};
    use crate::store::memory::MemoryStore;
    use crate::types::{
        FullTimeOdds, FullTimeOutcome, Game, GameOdds, MarketPick, Punter, Selection,
        SelectionStatus, Team,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn game() -> Game {
        Game::create(
            Team::named("Botafogo"),
            Team::named("Vasco"),
            "Sáb 19:00".to_string(),
            "Carioca".to_string(),
            GameOdds {
                full_time: FullTimeOdds {
                    home: dec!(1.5),
                    draw: dec!(3.0),
                    away: dec!(2.5),
                },
                total_goals: None,
                both_teams_score: None,
            },
            dec!(500),
        )
    }

    fn draft_for(game_id: &str, stake: rust_decimal::Decimal) -> BetDraft {
        BetDraft {
            draft_id: uuid::Uuid::new_v4().to_string(),
            selections: vec![Selection {
                game_id: game_id.to_string(),
                pick: MarketPick::FullTime {
                    pick: FullTimeOutcome::Home,
                },
                odds: dec!(1.5),
                status: SelectionStatus::Pending,
            }],
            price: dec!(1.5),
            stake,
            potential_payout: stake * dec!(1.5),
            punter: Punter {
                name: "Davi".to_string(),
                pix_key: "davi@example.com".to_string(),
            },
            quoted_at: Utc::now(),
        }
    }

    fn payment_event(id: &str) -> WebhookEvent {
        WebhookEvent {
            kind: Some("payment".to_string()),
            action: Some("payment.updated".to_string()),
            data: Some(WebhookData {
                id: PaymentId::Text(id.to_string()),
            }),
        }
    }

    fn provider_returning(status: PaymentState, metadata: serde_json::Value) -> MockPaymentProvider {
        let mut payments = MockPaymentProvider::new();
        payments.expect_fetch_payment().returning(move |id| {
            Ok(crate::payments::PaymentDetails {
                id: id.to_string(),
                status,
                metadata: metadata.clone(),
            })
        });
        payments
    }

    fn handler(store: Arc<MemoryStore>, payments: MockPaymentProvider) -> WebhookHandler {
        WebhookHandler::new(store, Arc::new(payments), OddsEngine::new(OddsConfig::default()))
    }

    #[tokio::test]
    async fn test_first_approval_persists_bet() {
        let store = Arc::new(MemoryStore::new());
        let g = game();
        store.insert_game(&g).await.unwrap();

        let draft = draft_for(&g.id, dec!(20));
        let metadata = serde_json::to_value(&draft).unwrap();
        let handler = handler(store.clone(), provider_returning(PaymentState::Approved, metadata));

        let outcome = handler.ingest(&payment_event("pay-1")).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Approved);

        let bets = store.bets().await.unwrap();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].payment_status, PaymentStatus::Approved);
        assert_eq!(bets[0].payment_ref.as_deref(), Some("pay-1"));
        // The quoted payout survives untouched.
        assert_eq!(bets[0].potential_payout, dec!(30));
    }

    #[tokio::test]
    async fn test_replayed_webhook_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let g = game();
        store.insert_game(&g).await.unwrap();

        let draft = draft_for(&g.id, dec!(100));
        let metadata = serde_json::to_value(&draft).unwrap();
        let handler = handler(store.clone(), provider_returning(PaymentState::Approved, metadata));

        assert_eq!(
            handler.ingest(&payment_event("pay-1")).await.unwrap(),
            IngestOutcome::Approved
        );
        for _ in 0..3 {
            assert_eq!(
                handler.ingest(&payment_event("pay-1")).await.unwrap(),
                IngestOutcome::Duplicate
            );
        }

        // Exactly one bet, and exactly one stake contribution: the pool
        // reflects a single 100, not four.
        let bets = store.bets().await.unwrap();
        assert_eq!(bets.len(), 1);
        let pool = StakePool::aggregate(&g.id, &bets);
        assert_eq!(pool.total, dec!(100));
    }

    #[tokio::test]
    async fn test_approval_triggers_odds_recompute() {
        let store = Arc::new(MemoryStore::new());
        let g = game();
        store.insert_game(&g).await.unwrap();

        // 100 on home, pool above STARTING_POOL — odds must move.
        let draft = draft_for(&g.id, dec!(100));
        let metadata = serde_json::to_value(&draft).unwrap();
        let handler = handler(store.clone(), provider_returning(PaymentState::Approved, metadata));
        handler.ingest(&payment_event("pay-1")).await.unwrap();

        let updated = store.game(&g.id).await.unwrap().unwrap();
        assert_ne!(updated.odds.full_time, g.odds.full_time);
        assert_eq!(updated.initial_odds.full_time, g.initial_odds.full_time);
    }

    #[tokio::test]
    async fn test_small_pool_leaves_odds_alone() {
        let store = Arc::new(MemoryStore::new());
        let g = game();
        store.insert_game(&g).await.unwrap();

        // 10 < STARTING_POOL (60): bet lands, odds hold at initial.
        let draft = draft_for(&g.id, dec!(10));
        let metadata = serde_json::to_value(&draft).unwrap();
        let handler = handler(store.clone(), provider_returning(PaymentState::Approved, metadata));
        handler.ingest(&payment_event("pay-1")).await.unwrap();

        let updated = store.game(&g.id).await.unwrap().unwrap();
        assert_eq!(updated.odds.full_time, g.initial_odds.full_time);
    }

    #[tokio::test]
    async fn test_reversal_refunds_and_removes_stake() {
        let store = Arc::new(MemoryStore::new());
        let g = game();
        store.insert_game(&g).await.unwrap();

        let draft = draft_for(&g.id, dec!(100));
        let metadata = serde_json::to_value(&draft).unwrap();

        let approve = handler(
            store.clone(),
            provider_returning(PaymentState::Approved, metadata.clone()),
        );
        approve.ingest(&payment_event("pay-1")).await.unwrap();

        let refund = handler(
            store.clone(),
            provider_returning(PaymentState::Refunded, metadata),
        );
        assert_eq!(
            refund.ingest(&payment_event("pay-1")).await.unwrap(),
            IngestOutcome::Refunded
        );
        // Replayed reversal: no-op.
        assert_eq!(
            refund.ingest(&payment_event("pay-1")).await.unwrap(),
            IngestOutcome::Ignored
        );

        let bets = store.bets().await.unwrap();
        assert_eq!(bets[0].payment_status, PaymentStatus::Refunded);
        assert_eq!(StakePool::aggregate(&g.id, &bets).total, dec!(0));
    }

    #[tokio::test]
    async fn test_non_payment_event_skips_provider_entirely() {
        let store = Arc::new(MemoryStore::new());
        // No expectations set: any fetch_payment call would panic.
        let handler = handler(store, MockPaymentProvider::new());

        let event = WebhookEvent {
            kind: Some("merchant_order".to_string()),
            action: None,
            data: Some(WebhookData {
                id: PaymentId::Number(5),
            }),
        };
        assert_eq!(handler.ingest(&event).await.unwrap(), IngestOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_pending_payment_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let handler = handler(
            store.clone(),
            provider_returning(PaymentState::Pending, serde_json::Value::Null),
        );
        assert_eq!(
            handler.ingest(&payment_event("pay-1")).await.unwrap(),
            IngestOutcome::Ignored
        );
        assert!(store.bets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_metadata_is_acknowledged_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let handler = handler(
            store.clone(),
            provider_returning(
                PaymentState::Approved,
                serde_json::json!({"unexpected": "shape"}),
            ),
        );
        assert_eq!(
            handler.ingest(&payment_event("pay-1")).await.unwrap(),
            IngestOutcome::Ignored
        );
        assert!(store.bets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_bubbles_up_for_redelivery() {
        let store = Arc::new(MemoryStore::new());
        let mut payments = MockPaymentProvider::new();
        payments
            .expect_fetch_payment()
            .returning(|_| Err(PaymentError::Transport("timeout".to_string())));

        let handler = handler(store, payments);
        let err = handler.ingest(&payment_event("pay-1")).await.unwrap_err();
        assert!(matches!(err, crate::betting::BettingError::Payment(_)));
    }

    #[test]
    fn test_webhook_event_parses_string_and_numeric_ids() {
        let raw = r#"{"type":"payment","data":{"id":"123"}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.payment_id().as_deref(), Some("123"));

        let raw = r#"{"action":"payment.updated","data":{"id":456}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.payment_id().as_deref(), Some("456"));
    }

    #[test]
    fn test_webhook_event_without_payment_kind_has_no_id() {
        let raw = r#"{"type":"test","data":{"id":"123"}}"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert!(event.payment_id().is_none());
    }
}
