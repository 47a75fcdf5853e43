//! Persistence layer.
//!
//! The rest of the system treats storage as a simple document store with
//! find/update operations behind the `Store` trait. Mutations to hot
//! fields (odds, statuses, selections) are expressed as targeted
//! per-field updates rather than whole-document overwrites, so the
//! admin's manual odds edits and the engine's automatic recomputes
//! cannot clobber each other's unrelated fields.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::types::{
    Bet, Game, GameOdds, GameResult, GameStatus, PaymentStatus, PayoutStatus, Selection,
};

/// Storage errors. Domain validation lives elsewhere; this is purely
/// about the document store failing or missing a document.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result of an insert guarded by the payment-reference uniqueness rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A bet with the same external payment reference already exists.
    /// Duplicate webhook deliveries land here and are treated as success.
    DuplicateReference,
}

/// Document-store operations used by the application.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Games -----------------------------------------------------------

    async fn insert_game(&self, game: &Game) -> Result<(), StoreError>;
    async fn game(&self, id: &str) -> Result<Option<Game>, StoreError>;
    async fn games(&self) -> Result<Vec<Game>, StoreError>;

    /// Replace the whole odds board in one write so readers never see a
    /// mix of old and new prices.
    async fn update_game_odds(&self, id: &str, odds: &GameOdds) -> Result<(), StoreError>;

    /// Set the lifecycle status, optionally recording the final result.
    async fn update_game_status(
        &self,
        id: &str,
        status: GameStatus,
        result: Option<&GameResult>,
    ) -> Result<(), StoreError>;

    // -- Bets ------------------------------------------------------------

    /// Insert a bet unless one with the same payment reference exists.
    /// This is the idempotency guard for at-least-once webhook delivery;
    /// uniqueness is enforced by the store, not by in-process locking.
    async fn insert_bet_if_absent(&self, bet: &Bet) -> Result<InsertOutcome, StoreError>;

    async fn bet(&self, id: &str) -> Result<Option<Bet>, StoreError>;
    async fn bets(&self) -> Result<Vec<Bet>, StoreError>;
    async fn bet_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Bet>, StoreError>;
    async fn bets_for_game(&self, game_id: &str) -> Result<Vec<Bet>, StoreError>;
    async fn bets_for_punter(&self, pix_key: &str) -> Result<Vec<Bet>, StoreError>;

    async fn update_bet_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<(), StoreError>;

    /// Persist settled selections after a game finalizes.
    async fn update_bet_selections(
        &self,
        id: &str,
        selections: &[Selection],
    ) -> Result<(), StoreError>;

    async fn update_bet_payout_status(
        &self,
        id: &str,
        status: PayoutStatus,
    ) -> Result<(), StoreError>;

    /// Admin reset: drop all bet history.
    async fn clear_bets(&self) -> Result<(), StoreError>;
}
