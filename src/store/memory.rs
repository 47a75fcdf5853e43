//! In-memory document store.
//!
//! Mirrors the SQLite store's semantics (including the payment-reference
//! uniqueness guard) without external dependencies. Used by unit and
//! integration tests, and handy for local development.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{InsertOutcome, Store, StoreError};
use crate::types::{
    Bet, Game, GameOdds, GameResult, GameStatus, PaymentStatus, PayoutStatus, Selection,
};

#[derive(Default)]
pub struct MemoryStore {
    games: RwLock<Vec<Game>>,
    bets: RwLock<Vec<Bet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        self.games.write().await.push(game.clone());
        Ok(())
    }

    async fn game(&self, id: &str) -> Result<Option<Game>, StoreError> {
        Ok(self.games.read().await.iter().find(|g| g.id == id).cloned())
    }

    async fn games(&self) -> Result<Vec<Game>, StoreError> {
        Ok(self.games.read().await.clone())
    }

    async fn update_game_odds(&self, id: &str, odds: &GameOdds) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let game = games
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "game",
                id: id.to_string(),
            })?;
        game.odds = odds.clone();
        Ok(())
    }

    async fn update_game_status(
        &self,
        id: &str,
        status: GameStatus,
        result: Option<&GameResult>,
    ) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        let game = games
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "game",
                id: id.to_string(),
            })?;
        game.status = status;
        if let Some(result) = result {
            game.result = result.clone();
        }
        Ok(())
    }

    async fn insert_bet_if_absent(&self, bet: &Bet) -> Result<InsertOutcome, StoreError> {
        let mut bets = self.bets.write().await;
        if let Some(ref payment_ref) = bet.payment_ref {
            let duplicate = bets
                .iter()
                .any(|b| b.payment_ref.as_deref() == Some(payment_ref.as_str()));
            if duplicate {
                return Ok(InsertOutcome::DuplicateReference);
            }
        }
        bets.push(bet.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn bet(&self, id: &str) -> Result<Option<Bet>, StoreError> {
        Ok(self.bets.read().await.iter().find(|b| b.id == id).cloned())
    }

    async fn bets(&self) -> Result<Vec<Bet>, StoreError> {
        Ok(self.bets.read().await.clone())
    }

    async fn bet_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Bet>, StoreError> {
        Ok(self
            .bets
            .read()
            .await
            .iter()
            .find(|b| b.payment_ref.as_deref() == Some(payment_ref))
            .cloned())
    }

    async fn bets_for_game(&self, game_id: &str) -> Result<Vec<Bet>, StoreError> {
        Ok(self
            .bets
            .read()
            .await
            .iter()
            .filter(|b| b.references_game(game_id))
            .cloned()
            .collect())
    }

    async fn bets_for_punter(&self, pix_key: &str) -> Result<Vec<Bet>, StoreError> {
        Ok(self
            .bets
            .read()
            .await
            .iter()
            .filter(|b| b.punter.pix_key == pix_key)
            .cloned()
            .collect())
    }

    async fn update_bet_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<(), StoreError> {
        let mut bets = self.bets.write().await;
        let bet = bets
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "bet",
                id: id.to_string(),
            })?;
        bet.payment_status = status;
        Ok(())
    }

    async fn update_bet_selections(
        &self,
        id: &str,
        selections: &[Selection],
    ) -> Result<(), StoreError> {
        let mut bets = self.bets.write().await;
        let bet = bets
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "bet",
                id: id.to_string(),
            })?;
        bet.selections = selections.to_vec();
        Ok(())
    }

    async fn update_bet_payout_status(
        &self,
        id: &str,
        status: PayoutStatus,
    ) -> Result<(), StoreError> {
        let mut bets = self.bets.write().await;
        let bet = bets
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "bet",
                id: id.to_string(),
            })?;
        bet.payout_status = status;
        Ok(())
    }

    async fn clear_bets(&self) -> Result<(), StoreError> {
        self.bets.write().await.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FullTimeOdds, FullTimeOutcome, MarketPick, Punter, SelectionStatus, Team,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn game() -> Game {
        Game::create(
            Team::named("Santos"),
            Team::named("Corinthians"),
            "Qua 21:30".to_string(),
            "Paulistão".to_string(),
            crate::types::GameOdds {
                full_time: FullTimeOdds {
                    home: dec!(2.0),
                    draw: dec!(3.2),
                    away: dec!(2.8),
                },
                total_goals: None,
                both_teams_score: None,
            },
            dec!(50),
        )
    }

    fn bet(payment_ref: Option<&str>) -> Bet {
        Bet {
            id: uuid::Uuid::new_v4().to_string(),
            selections: vec![Selection {
                game_id: "g1".to_string(),
                pick: MarketPick::FullTime {
                    pick: FullTimeOutcome::Home,
                },
                odds: dec!(2.0),
                status: SelectionStatus::Pending,
            }],
            price: dec!(2.0),
            stake: dec!(10),
            potential_payout: dec!(20),
            punter: Punter {
                name: "Ana".to_string(),
                pix_key: "ana@example.com".to_string(),
            },
            placed_at: Utc::now(),
            payment_status: PaymentStatus::Approved,
            payout_status: PayoutStatus::Pending,
            payment_ref: payment_ref.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_game_roundtrip_and_targeted_updates() {
        let store = MemoryStore::new();
        let g = game();
        store.insert_game(&g).await.unwrap();

        let loaded = store.game(&g.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, GameStatus::Open);

        let mut odds = loaded.odds.clone();
        odds.full_time.home = dec!(1.8);
        store.update_game_odds(&g.id, &odds).await.unwrap();

        store
            .update_game_status(&g.id, GameStatus::Finalized, Some(&GameResult::full_time_only(FullTimeOutcome::Home)))
            .await
            .unwrap();

        let loaded = store.game(&g.id).await.unwrap().unwrap();
        assert_eq!(loaded.odds.full_time.home, dec!(1.8));
        assert_eq!(loaded.status, GameStatus::Finalized);
        assert_eq!(loaded.result.full_time, Some(FullTimeOutcome::Home));
        // Initial odds untouched by the odds update.
        assert_eq!(loaded.initial_odds.full_time.home, dec!(2.0));
    }

    #[tokio::test]
    async fn test_duplicate_payment_ref_is_rejected() {
        let store = MemoryStore::new();
        let first = bet(Some("pay-42"));
        let second = bet(Some("pay-42"));

        assert_eq!(
            store.insert_bet_if_absent(&first).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_bet_if_absent(&second).await.unwrap(),
            InsertOutcome::DuplicateReference
        );
        assert_eq!(store.bets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finders() {
        let store = MemoryStore::new();
        store.insert_bet_if_absent(&bet(Some("p1"))).await.unwrap();
        let mut other = bet(Some("p2"));
        other.punter.pix_key = "bob@example.com".to_string();
        other.selections[0].game_id = "g2".to_string();
        store.insert_bet_if_absent(&other).await.unwrap();

        assert_eq!(store.bets_for_game("g1").await.unwrap().len(), 1);
        assert_eq!(store.bets_for_game("g2").await.unwrap().len(), 1);
        assert_eq!(
            store
                .bets_for_punter("ana@example.com")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .bet_by_payment_ref("p2")
            .await
            .unwrap()
            .is_some());
        assert!(store.bet_by_payment_ref("p3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_bet_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_bet_payment_status("nope", PaymentStatus::Refunded)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "bet", .. }));
    }

    #[tokio::test]
    async fn test_clear_bets() {
        let store = MemoryStore::new();
        store.insert_bet_if_absent(&bet(Some("p1"))).await.unwrap();
        store.clear_bets().await.unwrap();
        assert!(store.bets().await.unwrap().is_empty());
    }
}
