//! Payment-processor integration.
//!
//! Defines the `PaymentProvider` trait and the MercadoPago implementation.
//! The processor is an opaque external collaborator: we create hosted
//! checkout preferences carrying the full bet draft as metadata, and we
//! fetch payment details by id when its webhook fires.

pub mod mercadopago;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors talking to the payment processor.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment API request failed: {0}")]
    Transport(String),

    #[error("Payment API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed payment API response: {0}")]
    Malformed(String),
}

/// Payment state as reported by the processor. Unknown strings map to
/// `Unknown` instead of failing deserialization — the processor adds
/// states without notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Approved,
    Pending,
    InProcess,
    Authorized,
    Rejected,
    Refunded,
    Cancelled,
    ChargedBack,
    #[serde(other)]
    Unknown,
}

impl PaymentState {
    /// Whether this state reverses a previously approved payment.
    pub fn is_reversal(&self) -> bool {
        matches!(
            self,
            PaymentState::Refunded | PaymentState::Cancelled | PaymentState::ChargedBack
        )
    }
}

/// What we ask the processor to collect.
#[derive(Debug, Clone)]
pub struct PreferenceRequest {
    pub title: String,
    pub description: String,
    pub unit_price: Decimal,
    /// Our draft id, echoed back by the processor for reconciliation.
    pub external_reference: String,
    /// Full bet-reconstruction data, round-tripped through the processor.
    pub metadata: serde_json::Value,
}

/// A created checkout preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutPreference {
    pub id: String,
    /// URL of the processor's hosted checkout page.
    pub init_point: String,
}

/// Payment details fetched by id after a webhook notification.
#[derive(Debug, Clone)]
pub struct PaymentDetails {
    pub id: String,
    pub status: PaymentState,
    pub metadata: serde_json::Value,
}

/// Abstraction over the payment processor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted-checkout preference. Nothing is persisted on our
    /// side; a failure here is a clean no-op.
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<CheckoutPreference, PaymentError>;

    /// Fetch a payment's current state and metadata by processor id.
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentDetails, PaymentError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
