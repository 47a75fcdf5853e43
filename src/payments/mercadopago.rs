//! MercadoPago hosted-checkout integration.
//!
//! API docs: https://www.mercadopago.com.br/developers/en/reference
//! Base URL: https://api.mercadopago.com
//! Auth: `Authorization: Bearer {access_token}` on every call.
//!
//! We create checkout preferences (one BRL item per bet, metadata carrying
//! the bet draft) and fetch payments by id when webhooks arrive.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    CheckoutPreference, PaymentDetails, PaymentError, PaymentProvider, PaymentState,
    PreferenceRequest,
};

const BASE_URL: &str = "https://api.mercadopago.com";
const PROVIDER_NAME: &str = "mercadopago";

/// Everything the checkout items share: single unit, fixed currency.
const CURRENCY_ID: &str = "BRL";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    pub timeout_secs: u64,
    /// Where the hosted checkout sends the punter back to.
    pub success_url: String,
    pub failure_url: String,
    /// Our webhook endpoint, registered on each preference.
    pub notification_url: String,
}

// ---------------------------------------------------------------------------
// Wire types (MercadoPago JSON ↔ Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ItemBody<'a> {
    title: &'a str,
    description: &'a str,
    quantity: u32,
    currency_id: &'static str,
    unit_price: rust_decimal::Decimal,
}

#[derive(Debug, Serialize)]
struct BackUrlsBody<'a> {
    success: &'a str,
    failure: &'a str,
}

#[derive(Debug, Serialize)]
struct PreferenceBody<'a> {
    items: Vec<ItemBody<'a>>,
    back_urls: BackUrlsBody<'a>,
    auto_return: &'static str,
    notification_url: &'a str,
    external_reference: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: u64,
    status: PaymentState,
    #[serde(default)]
    metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// MercadoPago API client.
pub struct MercadoPagoClient {
    http: Client,
    access_token: Secret<String>,
    config: MercadoPagoConfig,
}

impl MercadoPagoClient {
    pub fn new(
        access_token: Secret<String>,
        config: MercadoPagoConfig,
    ) -> Result<Self, PaymentError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("MATCHBOOK/0.1.0 (betting-backend)")
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            access_token,
            config,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }
}

#[async_trait]
impl PaymentProvider for MercadoPagoClient {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<CheckoutPreference, PaymentError> {
        let body = PreferenceBody {
            items: vec![ItemBody {
                title: &request.title,
                description: &request.description,
                quantity: 1,
                currency_id: CURRENCY_ID,
                unit_price: request.unit_price,
            }],
            back_urls: BackUrlsBody {
                success: &self.config.success_url,
                failure: &self.config.failure_url,
            },
            auto_return: "approved",
            notification_url: &self.config.notification_url,
            external_reference: &request.external_reference,
            metadata: &request.metadata,
        };

        debug!(
            external_reference = %request.external_reference,
            unit_price = %request.unit_price,
            "Creating checkout preference"
        );

        let resp = self
            .http
            .post(format!("{BASE_URL}/checkout/preferences"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Api { status, body });
        }

        let pref: PreferenceResponse = resp
            .json()
            .await
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;

        Ok(CheckoutPreference {
            id: pref.id,
            init_point: pref.init_point,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentDetails, PaymentError> {
        let resp = self
            .http
            .get(format!("{BASE_URL}/v1/payments/{payment_id}"))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Api { status, body });
        }

        let payment: PaymentResponse = resp
            .json()
            .await
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;

        Ok(PaymentDetails {
            id: payment.id.to_string(),
            status: payment.status,
            metadata: payment.metadata,
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn client() -> MercadoPagoClient {
        MercadoPagoClient::new(
            Secret::new("TEST-TOKEN".to_string()),
            MercadoPagoConfig {
                timeout_secs: 30,
                success_url: "https://bets.example.com/ok".to_string(),
                failure_url: "https://bets.example.com/fail".to_string(),
                notification_url: "https://bets.example.com/api/webhooks/payments".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_client_builds_and_names_itself() {
        assert_eq!(client().name(), "mercadopago");
    }

    #[test]
    fn test_preference_body_shape() {
        let metadata = serde_json::json!({"draft_id": "d-1"});
        let body = PreferenceBody {
            items: vec![ItemBody {
                title: "Aposta no jogo: Palmeiras x Flamengo",
                description: "Palpite: 1x2/home",
                quantity: 1,
                currency_id: CURRENCY_ID,
                unit_price: dec!(25),
            }],
            back_urls: BackUrlsBody {
                success: "https://s",
                failure: "https://f",
            },
            auto_return: "approved",
            notification_url: "https://n",
            external_reference: "d-1",
            metadata: &metadata,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["items"][0]["currency_id"], "BRL");
        assert_eq!(json["items"][0]["quantity"], 1);
        assert_eq!(json["auto_return"], "approved");
        assert_eq!(json["external_reference"], "d-1");
        assert_eq!(json["metadata"]["draft_id"], "d-1");
    }

    #[test]
    fn test_payment_response_parses() {
        let raw = r#"{
            "id": 123456789,
            "status": "approved",
            "metadata": {"draft_id": "d-9"},
            "transaction_amount": 25.0
        }"#;
        let parsed: PaymentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, 123456789);
        assert_eq!(parsed.status, PaymentState::Approved);
        assert_eq!(parsed.metadata["draft_id"], "d-9");
    }

    #[test]
    fn test_payment_response_defaults_missing_metadata() {
        let raw = r#"{"id": 1, "status": "pending"}"#;
        let parsed: PaymentResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.metadata.is_null());
    }
}
