//! Financial rollups for the admin dashboard.
//!
//! Collected money is whatever the ledger says was paid, across all years.
//! Pending money is forward-looking: it comes from the due calculator per
//! member, so periods the generator hasn't materialized yet still count.
//! The per-period breakdown in contrast only covers records that exist.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::billing::due_summary;
use crate::store::models::{DuesRecord, DuesStatus, Expenditure, Member, MemberRole, Month};
use crate::types::MemberId;

/// Top-level money position of the committee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinancialSummary {
    /// Sum of every paid dues record.
    pub total_collected: Decimal,
    /// Sum of outstanding dues across members for the current year.
    pub total_pending: Decimal,
    /// Sum of all recorded expenditures.
    pub total_expenditure: Decimal,
    /// Collected minus spent.
    pub net_balance: Decimal,
    /// Chronological per-period breakdown of existing records.
    pub period_totals: Vec<PeriodTotals>,
}

/// Collected and outstanding amounts for one billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PeriodTotals {
    pub month: Month,
    pub year: i32,
    pub collected: Decimal,
    pub pending: Decimal,
}

/// Roll the ledger up into a [`FinancialSummary`].
pub fn summarize(
    members: &[Member],
    dues: &[DuesRecord],
    expenditures: &[Expenditure],
    monthly_fee: Decimal,
    now: DateTime<Utc>,
) -> FinancialSummary {
    let total_collected: Decimal = dues
        .iter()
        .filter(|r| r.status == DuesStatus::Paid)
        .map(|r| r.amount)
        .sum();

    let mut records_by_member: HashMap<MemberId, Vec<&DuesRecord>> = HashMap::new();
    for record in dues {
        records_by_member.entry(record.member_id).or_default().push(record);
    }

    let total_pending: Decimal = members
        .iter()
        .filter(|m| m.role == MemberRole::Member)
        .map(|m| {
            let member_records: Vec<DuesRecord> = records_by_member
                .get(&m.id)
                .map(|records| records.iter().map(|r| (*r).clone()).collect())
                .unwrap_or_default();
            due_summary(m.enrolled_at, now, &member_records, monthly_fee).pending_amount
        })
        .sum();

    let total_expenditure: Decimal = expenditures.iter().map(|e| e.amount).sum();

    // Keyed by (year, month number) so iteration comes out chronological.
    let mut buckets: BTreeMap<(i32, u32), PeriodTotals> = BTreeMap::new();
    for record in dues {
        let bucket = buckets
            .entry((record.year, record.month.number()))
            .or_insert_with(|| PeriodTotals {
                month: record.month,
                year: record.year,
                collected: Decimal::ZERO,
                pending: Decimal::ZERO,
            });
        match record.status {
            DuesStatus::Paid => bucket.collected += record.amount,
            DuesStatus::Pending => bucket.pending += record.amount,
        }
    }

    FinancialSummary {
        total_collected,
        total_pending,
        total_expenditure,
        net_balance: total_collected - total_expenditure,
        period_totals: buckets.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::dec;
    use uuid::Uuid;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn member(id: Uuid, role: MemberRole, enrolled_at: DateTime<Utc>) -> Member {
        Member {
            id,
            name: "Member".to_string(),
            email: format!("{id}@example.com"),
            phone: None,
            role,
            enrolled_at,
            created_at: enrolled_at,
            updated_at: enrolled_at,
        }
    }

    fn record(
        member_id: Uuid,
        month: Month,
        year: i32,
        amount: Decimal,
        status: DuesStatus,
    ) -> DuesRecord {
        DuesRecord {
            id: Uuid::new_v4(),
            member_id,
            month,
            year,
            amount,
            status,
            paid_at: None,
            method: None,
            receipt_id: None,
            gateway_payment_id: None,
            created_at: Utc::now(),
        }
    }

    fn expenditure(amount: Decimal) -> Expenditure {
        Expenditure {
            id: Uuid::new_v4(),
            description: "Hall rental".to_string(),
            amount,
            spent_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn totals_follow_the_ledger() {
        let asha = Uuid::new_v4();
        // Enrolled March 2024, evaluated in June 2024: four periods due.
        let members = vec![member(asha, MemberRole::Member, at(2024, 3, 1))];
        let dues = vec![
            record(asha, Month::March, 2024, dec!(500), DuesStatus::Paid),
            record(asha, Month::April, 2024, dec!(500), DuesStatus::Paid),
            record(asha, Month::May, 2024, dec!(500), DuesStatus::Pending),
        ];
        let spent = vec![expenditure(dec!(300))];

        let summary = summarize(&members, &dues, &spent, dec!(500), at(2024, 6, 15));

        assert_eq!(summary.total_collected, dec!(1000));
        // Two of four due periods paid, May billed and June not yet billed.
        assert_eq!(summary.total_pending, dec!(1000));
        assert_eq!(summary.total_expenditure, dec!(300));
        assert_eq!(summary.net_balance, dec!(700));
    }

    #[test]
    fn period_breakdown_is_chronological() {
        let asha = Uuid::new_v4();
        let members = vec![member(asha, MemberRole::Member, at(2023, 11, 1))];
        let dues = vec![
            record(asha, Month::January, 2024, dec!(500), DuesStatus::Paid),
            record(asha, Month::December, 2023, dec!(500), DuesStatus::Paid),
            record(asha, Month::February, 2024, dec!(500), DuesStatus::Pending),
        ];

        let summary = summarize(&members, &dues, &[], dec!(500), at(2024, 2, 10));
        let periods: Vec<(i32, Month)> = summary
            .period_totals
            .iter()
            .map(|p| (p.year, p.month))
            .collect();
        assert_eq!(
            periods,
            vec![
                (2023, Month::December),
                (2024, Month::January),
                (2024, Month::February)
            ]
        );
    }

    #[test]
    fn admins_owe_nothing() {
        let admin = Uuid::new_v4();
        let members = vec![member(admin, MemberRole::Admin, at(2020, 1, 1))];
        let summary = summarize(&members, &[], &[], dec!(500), at(2024, 6, 15));
        assert_eq!(summary.total_pending, dec!(0));
    }

    #[test]
    fn empty_ledger_sums_to_zero() {
        let summary = summarize(&[], &[], &[], dec!(500), at(2024, 6, 15));
        assert_eq!(summary.total_collected, dec!(0));
        assert_eq!(summary.net_balance, dec!(0));
        assert!(summary.period_totals.is_empty());
    }
}
