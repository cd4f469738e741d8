//! Payment gateway integration.
//!
//! The service never collects card details itself. It asks the gateway for a
//! hosted payment link covering one or more pending dues records, hands the
//! link's URL to the member, and waits for the gateway to call back on the
//! webhook endpoint once the link is paid. [`PaymentGateway`] abstracts the
//! provider; [`razorpay::RazorpayGateway`] talks to the real API and
//! [`dummy::DummyGateway`] fabricates links for local development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, TimeZone, Utc};
use rand::prelude::RngExt;
use rand::rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::GatewayConfig;

pub mod dummy;
pub mod razorpay;
pub mod signing;

pub use dummy::DummyGateway;
pub use razorpay::RazorpayGateway;

/// Header carrying the webhook body's HMAC digest.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Notes key listing the dues record ids a payment link settles,
/// comma-separated. Gateway notes only carry strings.
pub const DUES_RECORD_IDS_NOTE: &str = "dues_record_ids";

/// Notes key carrying the paying member's id.
pub const MEMBER_ID_NOTE: &str = "member_id";

/// Errors from the payment provider integration.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The webhook request carried no signature header
    #[error("webhook signature header missing")]
    MissingSignature,

    /// The webhook signature did not match the body
    #[error("webhook signature verification failed")]
    InvalidSignature,

    /// The amount cannot be expressed in the provider's minor units
    #[error("amount {amount} cannot be converted to minor currency units")]
    Amount { amount: Decimal },

    /// The HTTP call to the provider failed
    #[error("payment provider request failed: {0}")]
    Api(#[from] reqwest::Error),

    /// The provider answered with something we cannot use
    #[error("unexpected payment provider response: {message}")]
    UnexpectedResponse { message: String },
}

/// What we ask the provider to collect.
#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    /// Amount in major currency units.
    pub amount: Decimal,
    pub description: String,
    /// Our receipt id, echoed back by the provider.
    pub reference_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Where the provider sends the payer after checkout.
    pub return_url: Option<Url>,
    /// Opaque metadata the provider stores and returns in webhook payloads.
    pub notes: HashMap<String, String>,
}

/// A hosted checkout page created by the provider.
#[derive(Debug, Clone)]
pub struct PaymentLink {
    pub id: String,
    pub short_url: String,
}

/// A webhook delivery, decoded after signature verification.
///
/// `payment_link.paid` and `payment.captured` carry settlement work; every
/// other event kind the provider emits lands on [`WebhookEvent::Ignored`] and
/// is acknowledged without effect.
#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
pub enum WebhookEvent {
    #[serde(rename = "payment_link.paid")]
    PaymentLinkPaid {
        payload: PaymentLinkPaidPayload,
        #[serde(default)]
        created_at: Option<i64>,
    },
    #[serde(rename = "payment.captured")]
    PaymentCaptured {
        payload: PaymentCapturedPayload,
        #[serde(default)]
        created_at: Option<i64>,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkPaidPayload {
    pub payment_link: EntityWrapper<PaymentLinkEntity>,
    pub payment: EntityWrapper<PaymentEntity>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCapturedPayload {
    pub payment: EntityWrapper<PaymentEntity>,
}

/// Provider payloads nest every object under an `entity` key.
#[derive(Debug, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinkEntity {
    pub id: String,
    #[serde(default)]
    pub notes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    /// Minor currency units.
    pub amount: i64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub notes: HashMap<String, String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Settlement instruction extracted from an actionable webhook event.
///
/// The dues record ids come from the notes we attached when the link was
/// created; `payment_link.paid` stores them on the link entity while
/// `payment.captured` carries them on the payment itself.
#[derive(Debug)]
pub struct PaymentNotice {
    pub dues_record_ids: Vec<String>,
    pub gateway_payment_id: String,
    /// Minor currency units, as reported by the provider.
    pub amount_minor: i64,
    /// Provider-side settlement time, when the event carried one.
    pub paid_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    /// Extract the settlement instruction, or `None` for event kinds that
    /// settle nothing.
    pub fn into_notice(self) -> Option<PaymentNotice> {
        match self {
            WebhookEvent::PaymentLinkPaid { payload, created_at } => Some(PaymentNotice::new(
                payload.payment_link.entity.notes,
                payload.payment.entity,
                created_at,
            )),
            WebhookEvent::PaymentCaptured { payload, created_at } => {
                let payment = payload.payment.entity;
                let notes = payment.notes.clone();
                Some(PaymentNotice::new(notes, payment, created_at))
            }
            WebhookEvent::Ignored => None,
        }
    }
}

impl PaymentNotice {
    fn new(
        notes: HashMap<String, String>,
        payment: PaymentEntity,
        event_created_at: Option<i64>,
    ) -> Self {
        let dues_record_ids = notes
            .get(DUES_RECORD_IDS_NOTE)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let paid_at = payment
            .created_at
            .or(event_created_at)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        Self {
            dues_record_ids,
            gateway_payment_id: payment.id,
            amount_minor: payment.amount,
            paid_at,
        }
    }
}

/// Provider abstraction. Link creation talks to the provider's API; webhook
/// verification is pure and must not perform I/O.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError>;

    /// Verify a webhook delivery against the raw body bytes. Returns
    /// [`GatewayError::MissingSignature`] or [`GatewayError::InvalidSignature`]
    /// before the body is ever parsed.
    fn verify_webhook(&self, headers: &HeaderMap, body: &str) -> Result<(), GatewayError>;
}

/// Build the gateway the configuration asks for.
pub fn from_config(config: &GatewayConfig) -> Arc<dyn PaymentGateway> {
    match config {
        GatewayConfig::Razorpay(razorpay) => Arc::new(RazorpayGateway::new(razorpay.clone())),
        GatewayConfig::Dummy(dummy) => Arc::new(DummyGateway::new(dummy.webhook_secret.clone())),
    }
}

/// Fresh receipt id for a payment link: random tag plus a millisecond
/// timestamp, clipped to the provider's 40 character receipt limit.
pub fn new_receipt_id() -> String {
    let mut bytes = [0u8; 6];
    rng().fill(&mut bytes);
    let mut receipt = format!("rcpt_{}_{}", hex::encode(bytes), Utc::now().timestamp_millis());
    receipt.truncate(40);
    receipt
}

/// Convert a major-unit amount to the provider's integer minor units.
pub(crate) fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or(GatewayError::Amount { amount })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn paid_event_parses_notes_and_payment() {
        let body = r#"{
            "event": "payment_link.paid",
            "created_at": 1724131800,
            "payload": {
                "payment_link": {
                    "entity": {
                        "id": "plink_ABC123",
                        "notes": {"dues_record_ids": "a,b", "member_id": "m1"}
                    }
                },
                "payment": {
                    "entity": {"id": "pay_XYZ789", "amount": 100000, "method": "upi"}
                }
            }
        }"#;

        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        match event {
            WebhookEvent::PaymentLinkPaid { payload, created_at } => {
                assert_eq!(payload.payment_link.entity.id, "plink_ABC123");
                assert_eq!(
                    payload.payment_link.entity.notes.get(DUES_RECORD_IDS_NOTE),
                    Some(&"a,b".to_string())
                );
                assert_eq!(payload.payment.entity.id, "pay_XYZ789");
                assert_eq!(payload.payment.entity.amount, 100000);
                assert_eq!(created_at, Some(1724131800));
            }
            other => panic!("expected a paid event, got {other:?}"),
        }
    }

    #[test]
    fn unhandled_event_kinds_are_ignored() {
        let body = r#"{"event": "payment_link.expired", "payload": {"anything": true}}"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored));
        assert!(event.into_notice().is_none());
    }

    #[test]
    fn missing_notes_default_to_empty() {
        let body = r#"{
            "event": "payment_link.paid",
            "payload": {
                "payment_link": {"entity": {"id": "plink_1"}},
                "payment": {"entity": {"id": "pay_1", "amount": 50000}}
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        match event {
            WebhookEvent::PaymentLinkPaid { payload, created_at } => {
                assert!(payload.payment_link.entity.notes.is_empty());
                assert_eq!(created_at, None);
            }
            other => panic!("expected a paid event, got {other:?}"),
        }
    }

    #[test]
    fn paid_event_yields_a_settlement_notice() {
        let body = r#"{
            "event": "payment_link.paid",
            "created_at": 1724131800,
            "payload": {
                "payment_link": {
                    "entity": {
                        "id": "plink_1",
                        "notes": {"dues_record_ids": " a, b ,,c "}
                    }
                },
                "payment": {"entity": {"id": "pay_1", "amount": 150000}}
            }
        }"#;

        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        let notice = event.into_notice().unwrap();
        assert_eq!(notice.dues_record_ids, vec!["a", "b", "c"]);
        assert_eq!(notice.gateway_payment_id, "pay_1");
        assert_eq!(notice.amount_minor, 150000);
        assert_eq!(
            notice.paid_at,
            Some(Utc.timestamp_opt(1724131800, 0).single().unwrap())
        );
    }

    #[test]
    fn captured_event_reads_notes_from_the_payment() {
        let body = r#"{
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_2",
                        "amount": 50000,
                        "created_at": 1724131900,
                        "notes": {"dues_record_ids": "d", "member_id": "m1"}
                    }
                }
            }
        }"#;

        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        let notice = event.into_notice().unwrap();
        assert_eq!(notice.dues_record_ids, vec!["d"]);
        assert_eq!(notice.gateway_payment_id, "pay_2");
        assert_eq!(
            notice.paid_at,
            Some(Utc.timestamp_opt(1724131900, 0).single().unwrap())
        );
    }

    #[test]
    fn receipt_ids_fit_the_provider_limit() {
        let receipt = new_receipt_id();
        assert!(receipt.starts_with("rcpt_"));
        assert!(receipt.len() <= 40);
        assert_ne!(new_receipt_id(), new_receipt_id());
    }

    #[test]
    fn minor_unit_conversion_rounds_to_paise() {
        assert_eq!(to_minor_units(dec!(500)).unwrap(), 50000);
        assert_eq!(to_minor_units(dec!(499.99)).unwrap(), 49999);
        assert_eq!(to_minor_units(dec!(0.005)).unwrap(), 0);
    }
}
