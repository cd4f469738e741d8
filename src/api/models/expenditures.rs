//! API request/response models for expenditures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::models::Expenditure;
use crate::types::ExpenditureId;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpenditureCreate {
    pub description: String,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    /// When the money was spent; defaults to now.
    pub spent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExpenditureResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ExpenditureId,
    pub description: String,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub spent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Expenditure> for ExpenditureResponse {
    fn from(expenditure: Expenditure) -> Self {
        Self {
            id: expenditure.id,
            description: expenditure.description,
            amount: expenditure.amount,
            spent_at: expenditure.spent_at,
            created_at: expenditure.created_at,
        }
    }
}
