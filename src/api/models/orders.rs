//! API request/response models for payment orders.
//!
//! The order endpoint is what the member-facing UI calls, so its JSON uses
//! camelCase field names unlike the rest of the API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Pending dues records the payment link should cover.
    #[schema(value_type = Vec<String>)]
    pub dues_record_ids: Vec<Uuid>,
    /// Where the gateway sends the payer after checkout.
    #[schema(value_type = String, format = "uri")]
    pub return_url: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    /// Hosted checkout URL to open in the member's browser.
    pub short_url: String,
    /// Provider-side id of the created payment link.
    pub payment_link_id: String,
    /// Total the link collects, in major currency units.
    #[schema(value_type = f64)]
    pub amount: Decimal,
}
