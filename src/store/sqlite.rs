//! SQLite-backed document store.
//!
//! Each game and bet is one row holding the document as JSON text. Hot
//! fields are mutated with SQLite's JSON1 `json_set` so concurrent
//! writers (admin odds edits vs. automatic recomputes) only touch the
//! field they own. The payment-reference uniqueness constraint lives
//! here, closing the duplicate-webhook race at the persistence layer.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use super::{InsertOutcome, Store, StoreError};
use crate::types::{
    Bet, Game, GameOdds, GameResult, GameStatus, PaymentStatus, PayoutStatus, Selection,
};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and run the schema migration.
    ///
    /// A single connection: SQLite allows one writer anyway, and it also
    /// keeps `sqlite::memory:` databases coherent across calls.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(database_url, "SQLite store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS games (
                id  TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS bets (
                id          TEXT PRIMARY KEY,
                payment_ref TEXT,
                doc         TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // The idempotency guard for at-least-once webhook delivery.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_bets_payment_ref
             ON bets(payment_ref) WHERE payment_ref IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn parse_games(docs: Vec<String>) -> Result<Vec<Game>, StoreError> {
        docs.iter()
            .map(|d| serde_json::from_str(d).map_err(StoreError::from))
            .collect()
    }

    fn parse_bets(docs: Vec<String>) -> Result<Vec<Bet>, StoreError> {
        docs.iter()
            .map(|d| serde_json::from_str(d).map_err(StoreError::from))
            .collect()
    }
}

fn game_status_str(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Open => "open",
        GameStatus::Closed => "closed",
        GameStatus::Finalized => "finalized",
    }
}

fn payment_status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Approved => "approved",
        PaymentStatus::Refunded => "refunded",
    }
}

fn payout_status_str(status: PayoutStatus) -> &'static str {
    match status {
        PayoutStatus::Pending => "pending",
        PayoutStatus::Paid => "paid",
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_game(&self, game: &Game) -> Result<(), StoreError> {
        let doc = serde_json::to_string(game)?;
        sqlx::query("INSERT INTO games (id, doc) VALUES (?1, ?2)")
            .bind(&game.id)
            .bind(doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn game(&self, id: &str) -> Result<Option<Game>, StoreError> {
        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM games WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        doc.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }

    async fn games(&self) -> Result<Vec<Game>, StoreError> {
        let docs: Vec<String> = sqlx::query_scalar("SELECT doc FROM games ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Self::parse_games(docs)
    }

    async fn update_game_odds(&self, id: &str, odds: &GameOdds) -> Result<(), StoreError> {
        let odds_json = serde_json::to_string(odds)?;
        let result =
            sqlx::query("UPDATE games SET doc = json_set(doc, '$.odds', json(?1)) WHERE id = ?2")
                .bind(odds_json)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: "game",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_game_status(
        &self,
        id: &str,
        status: GameStatus,
        result: Option<&GameResult>,
    ) -> Result<(), StoreError> {
        let affected = match result {
            Some(result) => {
                let result_json = serde_json::to_string(result)?;
                sqlx::query(
                    "UPDATE games
                     SET doc = json_set(doc, '$.status', ?1, '$.result', json(?2))
                     WHERE id = ?3",
                )
                .bind(game_status_str(status))
                .bind(result_json)
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            None => sqlx::query(
                "UPDATE games SET doc = json_set(doc, '$.status', ?1) WHERE id = ?2",
            )
            .bind(game_status_str(status))
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected(),
        };

        if affected == 0 {
            return Err(StoreError::NotFound {
                kind: "game",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_bet_if_absent(&self, bet: &Bet) -> Result<InsertOutcome, StoreError> {
        let doc = serde_json::to_string(bet)?;
        // INSERT OR IGNORE + the partial unique index on payment_ref:
        // a duplicate reference inserts zero rows instead of erroring.
        let result =
            sqlx::query("INSERT OR IGNORE INTO bets (id, payment_ref, doc) VALUES (?1, ?2, ?3)")
                .bind(&bet.id)
                .bind(&bet.payment_ref)
                .bind(doc)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::DuplicateReference)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn bet(&self, id: &str) -> Result<Option<Bet>, StoreError> {
        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM bets WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        doc.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }

    async fn bets(&self) -> Result<Vec<Bet>, StoreError> {
        let docs: Vec<String> = sqlx::query_scalar("SELECT doc FROM bets ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Self::parse_bets(docs)
    }

    async fn bet_by_payment_ref(&self, payment_ref: &str) -> Result<Option<Bet>, StoreError> {
        let doc: Option<String> =
            sqlx::query_scalar("SELECT doc FROM bets WHERE payment_ref = ?1")
                .bind(payment_ref)
                .fetch_optional(&self.pool)
                .await?;
        doc.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
            .transpose()
    }

    async fn bets_for_game(&self, game_id: &str) -> Result<Vec<Bet>, StoreError> {
        let docs: Vec<String> = sqlx::query_scalar(
            "SELECT doc FROM bets WHERE EXISTS (
                 SELECT 1 FROM json_each(bets.doc, '$.selections') AS legs
                 WHERE json_extract(legs.value, '$.game_id') = ?1
             )
             ORDER BY rowid",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Self::parse_bets(docs)
    }

    async fn bets_for_punter(&self, pix_key: &str) -> Result<Vec<Bet>, StoreError> {
        let docs: Vec<String> = sqlx::query_scalar(
            "SELECT doc FROM bets
             WHERE json_extract(doc, '$.punter.pix_key') = ?1
             ORDER BY rowid",
        )
        .bind(pix_key)
        .fetch_all(&self.pool)
        .await?;
        Self::parse_bets(docs)
    }

    async fn update_bet_payment_status(
        &self,
        id: &str,
        status: PaymentStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bets SET doc = json_set(doc, '$.payment_status', ?1) WHERE id = ?2",
        )
        .bind(payment_status_str(status))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: "bet",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_bet_selections(
        &self,
        id: &str,
        selections: &[Selection],
    ) -> Result<(), StoreError> {
        let selections_json = serde_json::to_string(selections)?;
        let result = sqlx::query(
            "UPDATE bets SET doc = json_set(doc, '$.selections', json(?1)) WHERE id = ?2",
        )
        .bind(selections_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: "bet",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_bet_payout_status(
        &self,
        id: &str,
        status: PayoutStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bets SET doc = json_set(doc, '$.payout_status', ?1) WHERE id = ?2",
        )
        .bind(payout_status_str(status))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: "bet",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn clear_bets(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bets").execute(&self.pool).await?;
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
        FullTimeOdds, FullTimeOutcome, MarketPick, Punter, Selection, SelectionStatus, Team,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn game() -> Game {
        Game::create(
            Team::named("Bahia"),
            Team::named("Vitória"),
            "Dom 16:00".to_string(),
            "Baianão".to_string(),
            GameOdds {
                full_time: FullTimeOdds {
                    home: dec!(1.9),
                    draw: dec!(3.1),
                    away: dec!(2.7),
                },
                total_goals: None,
                both_teams_score: None,
            },
            dec!(35),
        )
    }

    fn bet(game_id: &str, payment_ref: &str) -> Bet {
        Bet {
            id: uuid::Uuid::new_v4().to_string(),
            selections: vec![Selection {
                game_id: game_id.to_string(),
                pick: MarketPick::FullTime {
                    pick: FullTimeOutcome::Home,
                },
                odds: dec!(1.9),
                status: SelectionStatus::Pending,
            }],
            price: dec!(1.9),
            stake: dec!(10),
            potential_payout: dec!(19),
            punter: Punter {
                name: "Rui".to_string(),
                pix_key: "rui@example.com".to_string(),
            },
            placed_at: Utc::now(),
            payment_status: PaymentStatus::Approved,
            payout_status: PayoutStatus::Pending,
            payment_ref: Some(payment_ref.to_string()),
        }
    }

    #[tokio::test]
    async fn test_game_roundtrip() {
        let store = store().await;
        let g = game();
        store.insert_game(&g).await.unwrap();

        let loaded = store.game(&g.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, g.id);
        assert_eq!(loaded.odds.full_time.home, dec!(1.9));
        assert!(store.game("missing").await.unwrap().is_none());
        assert_eq!(store.games().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_targeted_odds_update_leaves_rest_intact() {
        let store = store().await;
        let g = game();
        store.insert_game(&g).await.unwrap();

        let mut odds = g.odds.clone();
        odds.full_time.home = dec!(1.5);
        store.update_game_odds(&g.id, &odds).await.unwrap();

        let loaded = store.game(&g.id).await.unwrap().unwrap();
        assert_eq!(loaded.odds.full_time.home, dec!(1.5));
        assert_eq!(loaded.initial_odds.full_time.home, dec!(1.9));
        assert_eq!(loaded.status, GameStatus::Open);
    }

    #[tokio::test]
    async fn test_status_update_with_result() {
        let store = store().await;
        let g = game();
        store.insert_game(&g).await.unwrap();

        let result = GameResult {
            full_time: Some(FullTimeOutcome::Away),
            goals_total: Some(3),
            both_scored: Some(true),
        };
        store
            .update_game_status(&g.id, GameStatus::Finalized, Some(&result))
            .await
            .unwrap();

        let loaded = store.game(&g.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, GameStatus::Finalized);
        assert_eq!(loaded.result.full_time, Some(FullTimeOutcome::Away));
        assert_eq!(loaded.result.goals_total, Some(3));
    }

    #[tokio::test]
    async fn test_duplicate_payment_ref_inserts_once() {
        let store = store().await;
        let first = bet("g1", "pay-7");
        let second = bet("g1", "pay-7");

        assert_eq!(
            store.insert_bet_if_absent(&first).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_bet_if_absent(&second).await.unwrap(),
            InsertOutcome::DuplicateReference
        );

        assert_eq!(store.bets().await.unwrap().len(), 1);
        let found = store.bet_by_payment_ref("pay-7").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_bets_for_game_matches_any_selection() {
        let store = store().await;
        let mut multi = bet("g1", "pay-1");
        multi.selections.push(Selection {
            game_id: "g2".to_string(),
            pick: MarketPick::FullTime {
                pick: FullTimeOutcome::Draw,
            },
            odds: dec!(3.1),
            status: SelectionStatus::Pending,
        });
        store.insert_bet_if_absent(&multi).await.unwrap();
        store.insert_bet_if_absent(&bet("g3", "pay-2")).await.unwrap();

        assert_eq!(store.bets_for_game("g1").await.unwrap().len(), 1);
        assert_eq!(store.bets_for_game("g2").await.unwrap().len(), 1);
        assert_eq!(store.bets_for_game("g3").await.unwrap().len(), 1);
        assert!(store.bets_for_game("g4").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bets_for_punter() {
        let store = store().await;
        store.insert_bet_if_absent(&bet("g1", "pay-1")).await.unwrap();
        let mut other = bet("g1", "pay-2");
        other.punter.pix_key = "lia@example.com".to_string();
        store.insert_bet_if_absent(&other).await.unwrap();

        let mine = store.bets_for_punter("rui@example.com").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].punter.name, "Rui");
    }

    #[tokio::test]
    async fn test_bet_field_updates() {
        let store = store().await;
        let b = bet("g1", "pay-1");
        store.insert_bet_if_absent(&b).await.unwrap();

        store
            .update_bet_payment_status(&b.id, PaymentStatus::Refunded)
            .await
            .unwrap();

        let mut selections = b.selections.clone();
        selections[0].status = SelectionStatus::Won;
        store.update_bet_selections(&b.id, &selections).await.unwrap();

        store
            .update_bet_payout_status(&b.id, PayoutStatus::Paid)
            .await
            .unwrap();

        let loaded = store.bet(&b.id).await.unwrap().unwrap();
        assert_eq!(loaded.payment_status, PaymentStatus::Refunded);
        assert_eq!(loaded.selections[0].status, SelectionStatus::Won);
        assert_eq!(loaded.payout_status, PayoutStatus::Paid);
        // Frozen financials untouched by targeted updates.
        assert_eq!(loaded.potential_payout, dec!(19));
    }

    #[tokio::test]
    async fn test_clear_bets() {
        let store = store().await;
        store.insert_bet_if_absent(&bet("g1", "pay-1")).await.unwrap();
        store.clear_bets().await.unwrap();
        assert!(store.bets().await.unwrap().is_empty());
    }
}
