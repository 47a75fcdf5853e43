//! API route handlers.
//!
//! All endpoints speak JSON. Error mapping follows the house taxonomy:
//! validation problems are 4xx with a descriptive body and no state
//! mutated, payment-processor failures are 502 (the webhook caller
//! redelivers on non-2xx), store failures are 500, and idempotency
//! conflicts are success.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::betting::webhook::{IngestOutcome, WebhookEvent, WebhookHandler};
use crate::betting::{BetLimits, BettingError, CheckoutSession, TicketDesk, TicketRequest};
use crate::odds::engine::OddsEngine;
use crate::odds::{apply_manual_edit, validate_board, ManualOddsEdit, OddsConfig};
use crate::payments::{PaymentError, PaymentProvider};
use crate::settlement::report::{
    mark_user_paid, payout_summary, FinancialReport, MarkPaidSummary, PunterPayout,
};
use crate::settlement::{SettlementEngine, SettlementError, SettlementSummary};
use crate::store::{Store, StoreError};
use crate::types::{Bet, DomainError, Game, GameOdds, GameResult, GameStatus, Team};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub desk: Arc<TicketDesk>,
    pub webhook: Arc<WebhookHandler>,
    pub settlement: Arc<SettlementEngine>,
    pub odds_config: OddsConfig,
    pub default_max_stake: Decimal,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentProvider>,
        odds_config: OddsConfig,
        limits: BetLimits,
        default_max_stake: Decimal,
    ) -> Self {
        let desk = Arc::new(TicketDesk::new(store.clone(), payments.clone(), limits));
        let webhook = Arc::new(WebhookHandler::new(
            store.clone(),
            payments,
            OddsEngine::new(odds_config.clone()),
        ));
        let settlement = Arc::new(SettlementEngine::new(store.clone()));
        Self {
            store,
            desk,
            webhook,
            settlement,
            odds_config,
            default_max_stake,
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match &e {
            DomainError::GameNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::GameNotOpen { .. } | DomainError::InvalidStatusTransition { .. } => {
                StatusCode::CONFLICT
            }
            DomainError::MissingResult { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => {
                error!(error = %e, "Store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        error!(error = %e, "Payment provider failure");
        ApiError {
            status: StatusCode::BAD_GATEWAY,
            message: e.to_string(),
        }
    }
}

impl From<BettingError> for ApiError {
    fn from(e: BettingError) -> Self {
        match e {
            BettingError::Domain(e) => e.into(),
            BettingError::Store(e) => e.into(),
            BettingError::Payment(e) => e.into(),
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::Domain(e) => e.into(),
            SettlementError::Store(e) => e.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public routes
// ---------------------------------------------------------------------------

/// GET /
pub async fn root() -> &'static str {
    "MATCHBOOK backend is up. The storefront talks to /api."
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/games — open games with their current odds.
pub async fn list_games(State(state): State<AppState>) -> Result<Json<Vec<Game>>, ApiError> {
    let games = state
        .store
        .games()
        .await?
        .into_iter()
        .filter(|g| g.status == GameStatus::Open)
        .collect();
    Ok(Json(games))
}

/// GET /api/results — finalized games with their results.
pub async fn list_results(State(state): State<AppState>) -> Result<Json<Vec<Game>>, ApiError> {
    let games = state
        .store
        .games()
        .await?
        .into_iter()
        .filter(|g| g.status == GameStatus::Finalized)
        .collect();
    Ok(Json(games))
}

/// POST /api/bets — validate a ticket and open a checkout session.
pub async fn create_bet(
    State(state): State<AppState>,
    Json(request): Json<TicketRequest>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let session = state.desk.place(request).await?;
    Ok(Json(session))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub outcome: &'static str,
}

/// POST /api/webhooks/payments — payment-event notifications.
///
/// Must answer 2xx quickly and idempotently; the processor redelivers
/// anything else. Only provider/store failures produce a non-2xx.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<WebhookEvent>,
) -> Result<Json<WebhookAck>, ApiError> {
    let outcome = state.webhook.ingest(&event).await?;
    let outcome = match outcome {
        IngestOutcome::Approved => "approved",
        IngestOutcome::Duplicate => "duplicate",
        IngestOutcome::Refunded => "refunded",
        IngestOutcome::Ignored => "ignored",
    };
    Ok(Json(WebhookAck { outcome }))
}

/// GET /api/punters/:pix_key/bets — a punter's own bets.
pub async fn punter_bets(
    State(state): State<AppState>,
    Path(pix_key): Path<String>,
) -> Result<Json<Vec<Bet>>, ApiError> {
    Ok(Json(state.store.bets_for_punter(&pix_key).await?))
}

// ---------------------------------------------------------------------------
// Admin routes (authentication handled upstream)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub home: Team,
    pub away: Team,
    pub kickoff_label: String,
    pub competition: String,
    pub odds: GameOdds,
    #[serde(default)]
    pub max_stake_per_user: Option<Decimal>,
}

/// POST /api/admin/games
pub async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<Game>, ApiError> {
    validate_board(&request.odds, &state.odds_config)?;

    let game = Game::create(
        request.home,
        request.away,
        request.kickoff_label,
        request.competition,
        request.odds,
        request.max_stake_per_user.unwrap_or(state.default_max_stake),
    );
    state.store.insert_game(&game).await?;
    Ok(Json(game))
}

/// POST /api/admin/games/:id/close — stop accepting bets.
pub async fn close_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Game>, ApiError> {
    let game = state
        .store
        .game(&id)
        .await?
        .ok_or_else(|| DomainError::GameNotFound(id.clone()))?;

    if !game.status.can_transition_to(GameStatus::Closed) {
        return Err(DomainError::InvalidStatusTransition {
            game_id: id,
            from: game.status,
            to: GameStatus::Closed,
        }
        .into());
    }

    state
        .store
        .update_game_status(&id, GameStatus::Closed, None)
        .await?;
    let game = state
        .store
        .game(&id)
        .await?
        .ok_or_else(|| DomainError::GameNotFound(id.clone()))?;
    Ok(Json(game))
}

/// POST /api/admin/games/:id/finalize — record the result and settle.
pub async fn finalize_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(result): Json<GameResult>,
) -> Result<Json<SettlementSummary>, ApiError> {
    let summary = state.settlement.finalize_game(&id, result).await?;
    Ok(Json(summary))
}

/// PUT /api/admin/games/:id/odds — manual price override.
pub async fn edit_odds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(edit): Json<ManualOddsEdit>,
) -> Result<Json<GameOdds>, ApiError> {
    let game = state
        .store
        .game(&id)
        .await?
        .ok_or_else(|| DomainError::GameNotFound(id.clone()))?;

    if game.status != GameStatus::Open {
        return Err(DomainError::GameNotOpen {
            game_id: id,
            status: game.status,
        }
        .into());
    }

    let mut odds = game.odds.clone();
    apply_manual_edit(&id, &mut odds, &edit, &state.odds_config)?;
    state.store.update_game_odds(&id, &odds).await?;
    Ok(Json(odds))
}

/// POST /api/admin/punters/:pix_key/mark-paid
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(pix_key): Path<String>,
) -> Result<Json<MarkPaidSummary>, ApiError> {
    let summary = mark_user_paid(&state.store, &pix_key).await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report: FinancialReport,
    pub payouts: Vec<PunterPayout>,
}

/// GET /api/admin/report — financial reconciliation snapshot.
pub async fn admin_report(State(state): State<AppState>) -> Result<Json<ReportResponse>, ApiError> {
    let bets = state.store.bets().await?;
    Ok(Json(ReportResponse {
        report: FinancialReport::build(&bets),
        payouts: payout_summary(&bets),
    }))
}

/// DELETE /api/admin/history — drop all bet records.
pub async fn clear_history(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.clear_bets().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
