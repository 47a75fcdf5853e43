//! Shared types for the MATCHBOOK backend.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that odds, betting, settlement
//! and server modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// One competing side of a fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    /// Optional crest/badge URL shown by the front-end.
    #[serde(default)]
    pub crest_url: Option<String>,
}

impl Team {
    pub fn named(name: &str) -> Self {
        Team {
            name: name.to_string(),
            crest_url: None,
        }
    }
}

/// Lifecycle status of a game. Transitions are forward-only:
/// Open → Closed → Finalized, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Accepting bets.
    Open,
    /// No new bets; awaiting the final result.
    Closed,
    /// Result recorded; settlement has run.
    Finalized,
}

impl GameStatus {
    /// Whether moving to `next` respects the forward-only ordering.
    pub fn can_transition_to(&self, next: GameStatus) -> bool {
        matches!(
            (self, next),
            (GameStatus::Open, GameStatus::Closed)
                | (GameStatus::Open, GameStatus::Finalized)
                | (GameStatus::Closed, GameStatus::Finalized)
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Open => write!(f, "open"),
            GameStatus::Closed => write!(f, "closed"),
            GameStatus::Finalized => write!(f, "finalized"),
        }
    }
}

/// Full-time 1X2 outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullTimeOutcome {
    Home,
    Draw,
    Away,
}

impl FullTimeOutcome {
    pub const ALL: &'static [FullTimeOutcome] = &[
        FullTimeOutcome::Home,
        FullTimeOutcome::Draw,
        FullTimeOutcome::Away,
    ];
}

impl fmt::Display for FullTimeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullTimeOutcome::Home => write!(f, "home"),
            FullTimeOutcome::Draw => write!(f, "draw"),
            FullTimeOutcome::Away => write!(f, "away"),
        }
    }
}

/// Over/under pick for a totals market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverUnder {
    Over,
    Under,
}

/// Yes/no pick for a both-teams-score market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesNo {
    Yes,
    No,
}

/// Final result of a game. Each market carries its own pending slot:
/// `None` means that market has not been resolved yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameResult {
    pub full_time: Option<FullTimeOutcome>,
    /// Total goals scored in the match (resolves the totals market).
    pub goals_total: Option<u32>,
    /// Whether both sides scored (resolves the both-teams-score market).
    pub both_scored: Option<bool>,
}

impl GameResult {
    /// A result with only the 1X2 market resolved.
    pub fn full_time_only(outcome: FullTimeOutcome) -> Self {
        GameResult {
            full_time: Some(outcome),
            goals_total: None,
            both_scored: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

/// Decimal odds (payout multiplier including stake) for the 1X2 market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FullTimeOdds {
    pub home: Decimal,
    pub draw: Decimal,
    pub away: Decimal,
}

impl FullTimeOdds {
    pub fn price(&self, outcome: FullTimeOutcome) -> Decimal {
        match outcome {
            FullTimeOutcome::Home => self.home,
            FullTimeOutcome::Draw => self.draw,
            FullTimeOutcome::Away => self.away,
        }
    }

    pub fn set_price(&mut self, outcome: FullTimeOutcome, value: Decimal) {
        match outcome {
            FullTimeOutcome::Home => self.home = value,
            FullTimeOutcome::Draw => self.draw = value,
            FullTimeOutcome::Away => self.away = value,
        }
    }
}

impl fmt::Display for FullTimeOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1:{} X:{} 2:{}", self.home, self.draw, self.away)
    }
}

/// Decimal odds for an over/under totals market at a fixed line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotalsOdds {
    /// Goal line, e.g. 2.5. Integer lines push (void) on an exact hit.
    pub line: Decimal,
    pub over: Decimal,
    pub under: Decimal,
}

/// Decimal odds for a both-teams-score market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YesNoOdds {
    pub yes: Decimal,
    pub no: Decimal,
}

/// The full odds board of a game: 1X2 always, side markets optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOdds {
    pub full_time: FullTimeOdds,
    #[serde(default)]
    pub total_goals: Option<TotalsOdds>,
    #[serde(default)]
    pub both_teams_score: Option<YesNoOdds>,
}

impl GameOdds {
    /// Current price for a pick, or `None` when the game does not offer
    /// that market (or offers it at a different line).
    pub fn price_for(&self, pick: &MarketPick) -> Option<Decimal> {
        match pick {
            MarketPick::FullTime { pick } => Some(self.full_time.price(*pick)),
            MarketPick::TotalGoals { line, pick } => self
                .total_goals
                .as_ref()
                .filter(|t| t.line == *line)
                .map(|t| match pick {
                    OverUnder::Over => t.over,
                    OverUnder::Under => t.under,
                }),
            MarketPick::BothTeamsScore { pick } => {
                self.both_teams_score.as_ref().map(|b| match pick {
                    YesNo::Yes => b.yes,
                    YesNo::No => b.no,
                })
            }
        }
    }
}

/// One sporting fixture with its betting markets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub home: Team,
    pub away: Team,
    /// Display label for the scheduled time ("Sáb 16:00").
    pub kickoff_label: String,
    pub competition: String,
    pub status: GameStatus,
    #[serde(default)]
    pub result: GameResult,
    pub odds: GameOdds,
    /// Snapshot of the odds at creation time. Anchors the dynamic odds
    /// blend; never overwritten after creation.
    pub initial_odds: GameOdds,
    pub max_stake_per_user: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Game {
    /// Create a game with the given opening odds. This is the only place
    /// the `initial_odds` snapshot is taken; no other code path writes it.
    pub fn create(
        home: Team,
        away: Team,
        kickoff_label: String,
        competition: String,
        odds: GameOdds,
        max_stake_per_user: Decimal,
    ) -> Self {
        Game {
            id: uuid::Uuid::new_v4().to_string(),
            home,
            away,
            kickoff_label,
            competition,
            status: GameStatus::Open,
            result: GameResult::default(),
            initial_odds: odds.clone(),
            odds,
            max_stake_per_user,
            created_at: Utc::now(),
        }
    }

    pub fn title(&self) -> String {
        format!("{} x {}", self.home.name, self.away.name)
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) — {} | {}",
            self.status,
            self.title(),
            self.competition,
            self.kickoff_label,
            self.odds.full_time,
        )
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// A single pick on one of a game's markets. Tagged so new market kinds
/// are a compile-time-checked extension point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "market", rename_all = "snake_case")]
pub enum MarketPick {
    FullTime { pick: FullTimeOutcome },
    TotalGoals { line: Decimal, pick: OverUnder },
    BothTeamsScore { pick: YesNo },
}

impl fmt::Display for MarketPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketPick::FullTime { pick } => write!(f, "1x2/{pick}"),
            MarketPick::TotalGoals { line, pick } => match pick {
                OverUnder::Over => write!(f, "totals/over {line}"),
                OverUnder::Under => write!(f, "totals/under {line}"),
            },
            MarketPick::BothTeamsScore { pick } => match pick {
                YesNo::Yes => write!(f, "btts/yes"),
                YesNo::No => write!(f, "btts/no"),
            },
        }
    }
}

/// Settlement status of one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    Pending,
    Won,
    Lost,
    /// Pushed — e.g. a totals line hit exactly. Resolved but neutral.
    Void,
}

/// One leg of a bet, with the odds frozen at acceptance time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub game_id: String,
    pub pick: MarketPick,
    pub odds: Decimal,
    pub status: SelectionStatus,
}

/// Payment confirmation state, mirroring the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Refunded,
}

/// Whether a won bet's obligation has been discharged. Independent of
/// `PaymentStatus`; one-way Pending → Paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

/// Bettor identity: display name plus the PIX key payouts are sent to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Punter {
    pub name: String,
    pub pix_key: String,
}

/// Overall settlement outcome of a bet, derived from its selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetOutcome {
    Pending,
    Won,
    Lost,
}

/// One wagering transaction, possibly a multi-leg ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub selections: Vec<Selection>,
    /// Aggregate price: product of selection odds. Frozen at acceptance.
    pub price: Decimal,
    pub stake: Decimal,
    /// stake × price, computed at acceptance and never recomputed.
    pub potential_payout: Decimal,
    pub punter: Punter,
    pub placed_at: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub payout_status: PayoutStatus,
    /// Opaque payment-processor id. Unique when present; the idempotency
    /// key for webhook processing.
    #[serde(default)]
    pub payment_ref: Option<String>,
}

impl Bet {
    /// Overall outcome: lost if any leg lost, pending if any leg still
    /// pending, otherwise won (void legs count as resolved).
    pub fn outcome(&self) -> BetOutcome {
        if self
            .selections
            .iter()
            .any(|s| s.status == SelectionStatus::Lost)
        {
            return BetOutcome::Lost;
        }
        if self
            .selections
            .iter()
            .any(|s| s.status == SelectionStatus::Pending)
        {
            return BetOutcome::Pending;
        }
        BetOutcome::Won
    }

    /// Whether this is a single-leg bet (feeds the primary stake pool).
    pub fn is_single(&self) -> bool {
        self.selections.len() == 1
    }

    pub fn references_game(&self, game_id: &str) -> bool {
        self.selections.iter().any(|s| s.game_id == game_id)
    }

    /// Distinct game ids across all selections, in first-seen order.
    pub fn game_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for s in &self.selections {
            if !ids.iter().any(|id| id == &s.game_id) {
                ids.push(s.game_id.clone());
            }
        }
        ids
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} legs @ {} | stake R${} → R${} | {:?}/{:?}",
            self.punter.name,
            self.selections.len(),
            self.price,
            self.stake,
            self.potential_payout,
            self.payment_status,
            self.payout_status,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for MATCHBOOK.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Game {game_id} is {status}, not accepting bets")]
    GameNotOpen { game_id: String, status: GameStatus },

    #[error("Game {game_id} does not offer market {market}")]
    UnknownMarket { game_id: String, market: String },

    #[error("A bet needs at least one selection")]
    EmptyTicket,

    #[error("Invalid stake: R${0}")]
    InvalidStake(Decimal),

    #[error(
        "Stake limit exceeded on game {game_id}: limit R${limit}, \
         already staked R${existing}, remaining allowance R${remaining}"
    )]
    StakeLimitExceeded {
        game_id: String,
        limit: Decimal,
        existing: Decimal,
        remaining: Decimal,
    },

    #[error(
        "Stakes above R${max_stake} are not accepted at odds below \
         {threshold} (selection priced at {odds})"
    )]
    ShortOddsStakeCapped {
        odds: Decimal,
        threshold: Decimal,
        max_stake: Decimal,
    },

    #[error("Odds {value} outside allowed range [{min}, {max}]")]
    OddsOutOfRange {
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Invalid status transition for game {game_id}: {from} → {to}")]
    InvalidStatusTransition {
        game_id: String,
        from: GameStatus,
        to: GameStatus,
    },

    #[error("Game result does not resolve market {market}")]
    MissingResult { market: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
