//! Dummy payment gateway.
//!
//! Fabricates payment links without talking to anyone. Link creation still
//! validates the amount the way the real provider would, and webhook
//! verification runs the same HMAC check, so the full payment flow can be
//! exercised locally by signing test deliveries with the configured secret.

use rand::prelude::RngExt;
use rand::rng;
use tracing::info;

use super::{
    GatewayError, PaymentGateway, PaymentLink, PaymentLinkRequest, SIGNATURE_HEADER, signing,
    to_minor_units,
};

pub struct DummyGateway {
    webhook_secret: String,
}

impl DummyGateway {
    pub fn new(webhook_secret: String) -> Self {
        Self { webhook_secret }
    }
}

#[async_trait::async_trait]
impl PaymentGateway for DummyGateway {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLink, GatewayError> {
        let amount_minor = to_minor_units(request.amount)?;
        let mut bytes = [0u8; 8];
        rng().fill(&mut bytes);
        let id = format!("plink_{}", hex::encode(bytes));
        info!(
            link_id = %id,
            amount_minor,
            reference_id = %request.reference_id,
            "created dummy payment link"
        );
        Ok(PaymentLink {
            short_url: format!("https://pay.invalid/{id}"),
            id,
        })
    }

    fn verify_webhook(
        &self,
        headers: &axum::http::HeaderMap,
        body: &str,
    ) -> Result<(), GatewayError> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(GatewayError::MissingSignature)?;
        if !signing::verify(body, signature, &self.webhook_secret) {
            return Err(GatewayError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;
    use std::collections::HashMap;

    #[tokio::test]
    async fn fabricated_links_are_unique_and_resolvable() {
        let gateway = DummyGateway::new("secret".to_string());
        let request = PaymentLinkRequest {
            amount: dec!(500),
            description: "Membership dues".to_string(),
            reference_id: "rcpt_test".to_string(),
            customer_name: "Asha Nair".to_string(),
            customer_email: "asha@example.com".to_string(),
            customer_phone: None,
            return_url: None,
            notes: HashMap::new(),
        };

        let first = gateway.create_payment_link(&request).await.unwrap();
        let second = gateway.create_payment_link(&request).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(first.short_url.contains(&first.id));
    }

    #[tokio::test]
    async fn signed_deliveries_verify_like_the_real_provider() {
        let gateway = DummyGateway::new("secret".to_string());
        let body = r#"{"event":"payment_link.paid"}"#;
        let signature = signing::sign(body, "secret").unwrap();

        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            axum::http::HeaderValue::from_str(&signature).unwrap(),
        );
        assert!(gateway.verify_webhook(&headers, body).is_ok());
        assert!(matches!(
            gateway.verify_webhook(&headers, r#"{"event":"tampered"}"#),
            Err(GatewayError::InvalidSignature)
        ));
    }
}
