//! API request/response models for billing settings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsUpdate {
    /// Monthly fee in major currency units; must be at least 1.
    #[schema(value_type = f64)]
    pub monthly_fee: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    #[schema(value_type = f64)]
    pub monthly_fee: Decimal,
    /// False while the fee has never been set; `monthly_fee` then carries the
    /// configured display default and billing refuses to run.
    pub configured: bool,
    pub updated_at: Option<DateTime<Utc>>,
}
