//! Ledger store models.
//!
//! These are the persistence-layer types shared by every store backend. API
//! request/response shapes live in [`crate::api::models`] and convert from
//! these via `From` impls.

use crate::types::{DuesRecordId, ExpenditureId, MemberId, UserId};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// A billing month, stored and serialized as its full English name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text")]
pub enum Month {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl Month {
    const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    /// Month for a 1-based calendar number (chrono's `Datelike::month`).
    pub fn from_number(number: u32) -> Option<Month> {
        Self::ALL.get(number.checked_sub(1)? as usize).copied()
    }

    /// The month a timestamp falls in.
    pub fn of(date: &DateTime<Utc>) -> Month {
        // month0() is always 0..=11
        Self::ALL[date.month0() as usize]
    }

    /// 1-based calendar number (January = 1).
    pub fn number(self) -> u32 {
        self as u32 + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown month name: {s}"))
    }
}

/// Role of a committee member. Admins run the books and are not billed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    #[default]
    Member,
    Admin,
}

/// Status of a dues record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DuesStatus {
    Pending,
    Paid,
}

/// How a dues record was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Online,
}

/// A committee member. Enrollment date drives the due calculation and is
/// immutable after creation; only name and phone are editable.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: MemberRole,
    pub enrolled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MemberCreateRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: MemberRole,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberUpdateRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// One billing obligation: one member, one (month, year) period.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DuesRecord {
    pub id: DuesRecordId,
    pub member_id: MemberId,
    pub month: Month,
    pub year: i32,
    pub amount: Decimal,
    pub status: DuesStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
    pub receipt_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DuesRecordCreateRequest {
    pub member_id: MemberId,
    pub month: Month,
    pub year: i32,
    pub amount: Decimal,
    pub status: DuesStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub method: Option<PaymentMethod>,
    pub receipt_id: Option<String>,
}

/// Seed dues record created alongside a new member, before the member id
/// is known.
#[derive(Debug, Clone)]
pub struct InitialDues {
    pub month: Month,
    pub year: i32,
    pub amount: Decimal,
}

/// Settlement metadata applied when a record transitions to `Paid`.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub receipt_id: Option<String>,
    pub gateway_payment_id: Option<String>,
}

/// Filter for listing dues records.
#[derive(Debug, Clone, Default)]
pub struct DuesFilter {
    pub member_id: Option<MemberId>,
    pub status: Option<DuesStatus>,
    pub year: Option<i32>,
}

/// A recorded outflow. Immutable once created.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Expenditure {
    pub id: ExpenditureId,
    pub description: String,
    pub amount: Decimal,
    pub spent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExpenditureCreateRequest {
    pub description: String,
    pub amount: Decimal,
    pub spent_at: DateTime<Utc>,
}

/// The billing settings singleton: the fee charged per billing period.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillingSettings {
    pub monthly_fee: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// An operator account (admin login), distinct from [`Member`]: members are
/// ledger entities, operators hold sessions.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserCreateRequest {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_month_number_round_trip() {
        for number in 1..=12 {
            let month = Month::from_number(number).unwrap();
            assert_eq!(month.number(), number);
        }
        assert!(Month::from_number(0).is_none());
        assert!(Month::from_number(13).is_none());
    }

    #[test]
    fn test_month_of_date() {
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(Month::of(&date), Month::March);
    }

    #[test]
    fn test_month_parses_full_english_names() {
        assert_eq!("January".parse::<Month>().unwrap(), Month::January);
        assert_eq!("december".parse::<Month>().unwrap(), Month::December);
        assert!("Janvier".parse::<Month>().is_err());
    }

    #[test]
    fn test_month_serializes_as_name() {
        let json = serde_json::to_string(&Month::August).unwrap();
        assert_eq!(json, "\"August\"");
        let back: Month = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Month::August);
    }
}
