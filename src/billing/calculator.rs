//! Due arithmetic for a single member.
//!
//! Periods are calendar months scoped to the current year: a member enrolled
//! in a previous year owes January through the current month, a member
//! enrolled this year owes their enrollment month through the current month,
//! and a member enrolled in the future owes nothing yet.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::models::{DuesRecord, DuesStatus};

/// Snapshot of where a member stands against the current year's dues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DueSummary {
    /// Billing periods owed so far this year.
    pub due_periods: u32,
    /// Periods settled this year.
    pub paid_periods: u32,
    /// Periods still outstanding.
    pub pending_periods: u32,
    /// Outstanding periods times the monthly fee.
    pub pending_amount: Decimal,
    /// Paid over due as a percentage, capped at 100.
    pub progress_percent: f64,
}

/// Number of billing periods the member owes for the year containing `now`.
pub fn due_periods(enrolled_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let enrolled_year = enrolled_at.year();
    let current_year = now.year();

    if enrolled_year > current_year {
        return 0;
    }
    if enrolled_year < current_year {
        return now.month();
    }
    // Enrolled this year: enrollment month through the current month,
    // inclusive. An enrollment month still in the future owes nothing.
    (now.month() as i64 - enrolled_at.month() as i64 + 1).max(0) as u32
}

/// Compute the member's standing from their dues records.
///
/// `records` may span multiple years; only records for the year containing
/// `now` count toward `paid_periods`.
pub fn due_summary(
    enrolled_at: DateTime<Utc>,
    now: DateTime<Utc>,
    records: &[DuesRecord],
    monthly_fee: Decimal,
) -> DueSummary {
    let due = due_periods(enrolled_at, now);
    let paid = records
        .iter()
        .filter(|r| r.year == now.year() && r.status == DuesStatus::Paid)
        .count() as u32;
    let pending = due.saturating_sub(paid);

    let progress = if due == 0 {
        100.0
    } else {
        (f64::from(paid) / f64::from(due) * 100.0).min(100.0)
    };

    DueSummary {
        due_periods: due,
        paid_periods: paid,
        pending_periods: pending,
        pending_amount: Decimal::from(pending) * monthly_fee,
        progress_percent: progress,
    }
}
