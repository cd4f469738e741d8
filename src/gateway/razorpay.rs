//! Razorpay payment links.
//!
//! Uses the Payment Links REST API: one authenticated POST creates a hosted
//! checkout page, and the provider later reports settlement through a signed
//! `payment_link.paid` webhook. Amounts go over the wire in paise.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::RazorpayConfig;

use super::{
    GatewayError, PaymentGateway, PaymentLink, PaymentLinkRequest, SIGNATURE_HEADER, signing,
    to_minor_units,
};

const CURRENCY: &str = "INR";

/// Razorpay's own deliveries sign with this header; [`SIGNATURE_HEADER`] is
/// the name our webhook contract documents. Both are accepted.
pub const RAZORPAY_SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub struct RazorpayGateway {
    client: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct CreateLinkBody<'a> {
    amount: i64,
    currency: &'static str,
    accept_partial: bool,
    reference_id: &'a str,
    description: &'a str,
    customer: Customer<'a>,
    notify: Notify,
    reminder_enable: bool,
    notes: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_method: Option<&'static str>,
}

#[derive(Serialize)]
struct Customer<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<&'a str>,
}

#[derive(Serialize)]
struct Notify {
    email: bool,
    sms: bool,
}

#[derive(Deserialize)]
struct CreateLinkResponse {
    id: String,
    short_url: String,
}

#[async_trait::async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        let url = self
            .config
            .api_base
            .join("payment_links")
            .map_err(|e| GatewayError::UnexpectedResponse {
                message: format!("invalid API base URL: {e}"),
            })?;

        let body = CreateLinkBody {
            amount: to_minor_units(request.amount)?,
            currency: CURRENCY,
            accept_partial: false,
            reference_id: &request.reference_id,
            description: &request.description,
            customer: Customer {
                name: &request.customer_name,
                email: &request.customer_email,
                contact: request.customer_phone.as_deref(),
            },
            notify: Notify {
                email: true,
                sms: request.customer_phone.is_some(),
            },
            reminder_enable: true,
            notes: &request.notes,
            callback_url: request.return_url.as_ref().map(|url| url.as_str()),
            callback_method: request.return_url.as_ref().map(|_| "get"),
        };

        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::UnexpectedResponse {
                message: format!("{status}: {detail}"),
            });
        }

        let link: CreateLinkResponse = response.json().await?;
        Ok(PaymentLink {
            id: link.id,
            short_url: link.short_url,
        })
    }

    fn verify_webhook(
        &self,
        headers: &axum::http::HeaderMap,
        body: &str,
    ) -> Result<(), GatewayError> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .or_else(|| headers.get(RAZORPAY_SIGNATURE_HEADER))
            .and_then(|value| value.to_str().ok())
            .ok_or(GatewayError::MissingSignature)?;
        if !signing::verify(body, signature, &self.config.webhook_secret) {
            return Err(GatewayError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use rust_decimal::dec;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_base: &str) -> RazorpayConfig {
        // The reqwest client needs a process-level TLS provider even for
        // plain-http mock servers. main() does this for the real binary.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: "rzp_test_secret".to_string(),
            webhook_secret: "whsec_test".to_string(),
            api_base: Url::parse(api_base).unwrap(),
        }
    }

    fn link_request() -> PaymentLinkRequest {
        PaymentLinkRequest {
            amount: dec!(1500),
            description: "Membership dues for 3 periods".to_string(),
            reference_id: "rcpt_abc123_1724131800000".to_string(),
            customer_name: "Asha Nair".to_string(),
            customer_email: "asha@example.com".to_string(),
            customer_phone: Some("+919876543210".to_string()),
            return_url: Some(Url::parse("https://club.example.com/dashboard").unwrap()),
            notes: HashMap::from([(
                super::super::DUES_RECORD_IDS_NOTE.to_string(),
                "a,b,c".to_string(),
            )]),
        }
    }

    #[tokio::test]
    async fn creates_payment_link_in_minor_units() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment_links"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({
                "amount": 150000,
                "currency": "INR",
                "accept_partial": false,
                "reference_id": "rcpt_abc123_1724131800000",
                "customer": {"email": "asha@example.com"},
                "callback_url": "https://club.example.com/dashboard",
                "callback_method": "get"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "plink_Nf2cDkV3pW",
                "short_url": "https://rzp.io/i/abc123",
                "status": "created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = RazorpayGateway::new(test_config(&server.uri()));
        let link = gateway.create_payment_link(&link_request()).await.unwrap();
        assert_eq!(link.id, "plink_Nf2cDkV3pW");
        assert_eq!(link.short_url, "https://rzp.io/i/abc123");
    }

    #[tokio::test]
    async fn provider_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment_links"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"description": "amount must be at least 100"}
            })))
            .mount(&server)
            .await;

        let gateway = RazorpayGateway::new(test_config(&server.uri()));
        let err = gateway
            .create_payment_link(&link_request())
            .await
            .unwrap_err();
        match err {
            GatewayError::UnexpectedResponse { message } => {
                assert!(message.contains("400"));
                assert!(message.contains("amount must be at least 100"));
            }
            other => panic!("expected UnexpectedResponse, got {other:?}"),
        }
    }

    #[test]
    fn webhook_verification_distinguishes_missing_and_invalid() {
        let gateway = RazorpayGateway::new(test_config("https://api.razorpay.com/v1/"));
        let body = r#"{"event":"payment_link.paid"}"#;

        let empty = HeaderMap::new();
        assert!(matches!(
            gateway.verify_webhook(&empty, body),
            Err(GatewayError::MissingSignature)
        ));

        let mut tampered = HeaderMap::new();
        tampered.insert(SIGNATURE_HEADER, HeaderValue::from_static("deadbeef"));
        assert!(matches!(
            gateway.verify_webhook(&tampered, body),
            Err(GatewayError::InvalidSignature)
        ));

        let mut valid = HeaderMap::new();
        let signature = signing::sign(body, "whsec_test").unwrap();
        valid.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());
        assert!(gateway.verify_webhook(&valid, body).is_ok());
    }

    #[test]
    fn provider_native_signature_header_is_accepted() {
        let gateway = RazorpayGateway::new(test_config("https://api.razorpay.com/v1/"));
        let body = r#"{"event":"payment_link.paid"}"#;

        let mut headers = HeaderMap::new();
        let signature = signing::sign(body, "whsec_test").unwrap();
        headers.insert(
            RAZORPAY_SIGNATURE_HEADER,
            HeaderValue::from_str(&signature).unwrap(),
        );
        assert!(gateway.verify_webhook(&headers, body).is_ok());
    }
}
