//! API request/response models for dues records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::store::models::{DuesRecord, DuesStatus, Month, PaymentMethod};
use crate::types::{DuesRecordId, MemberId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DuesRecordResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DuesRecordId,
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub month: Month,
    pub year: i32,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub status: DuesStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
    pub receipt_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DuesRecord> for DuesRecordResponse {
    fn from(record: DuesRecord) -> Self {
        Self {
            id: record.id,
            member_id: record.member_id,
            month: record.month,
            year: record.year,
            amount: record.amount,
            status: record.status,
            paid_at: record.paid_at,
            method: record.method,
            receipt_id: record.receipt_id,
            gateway_payment_id: record.gateway_payment_id,
            created_at: record.created_at,
        }
    }
}

/// Query parameters for listing dues records.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListDuesQuery {
    /// Restrict to one member
    #[param(value_type = Option<String>, format = "uuid")]
    pub member_id: Option<MemberId>,
    /// Restrict to one settlement status
    pub status: Option<DuesStatus>,
    /// Restrict to one calendar year
    pub year: Option<i32>,
}

/// Manual cash settlement of one billed period.
///
/// The target record is addressed by member and period rather than by id so
/// the instruction matches what the treasurer reads off the ledger book.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManualPaymentRequest {
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub month: Month,
    pub year: i32,
    /// Collected amount; when present it must match the billed amount.
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
    /// When the cash changed hands; defaults to now.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Admin backfill of a period the generator never billed, for offline
/// payments and record corrections.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BackfillDuesRequest {
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub month: Month,
    pub year: i32,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    /// Defaults to `Paid`; backfilled periods usually record money already
    /// collected.
    pub status: Option<DuesStatus>,
    /// Settlement timestamp for `Paid` backfills; defaults to now.
    pub paid_at: Option<DateTime<Utc>>,
    /// Settlement method for `Paid` backfills; defaults to `Cash`.
    pub method: Option<PaymentMethod>,
}
