//! Periodic dues generation.
//!
//! One generator pass creates a `Pending` dues record at the configured
//! monthly fee for every billable member who doesn't have one for the
//! current period yet. The store's per-period uniqueness makes the pass
//! idempotent, so the scheduler can simply re-run it on an interval and
//! admins can trigger it by hand after enrolling a batch of members.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::billing::calculator;
use crate::errors::{Error, Result};
use crate::store::models::{DuesRecordCreateRequest, DuesStatus, MemberRole, Month};
use crate::store::{LedgerStore, StoreError};

/// Outcome of one generator pass.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillingRun {
    pub month: Month,
    pub year: i32,
    /// Dues records created in this pass.
    pub created: u32,
    /// Members who already had a record for the period.
    pub skipped: u32,
}

/// Generate pending dues for the period containing `now`.
///
/// Aborts with a configuration error when the monthly fee has never been
/// set or is not positive; a generator that guesses a fee would be writing
/// invented amounts into the ledger.
#[instrument(skip_all)]
pub async fn run_billing(store: &dyn LedgerStore, now: DateTime<Utc>) -> Result<BillingRun> {
    let settings = store
        .get_settings()
        .await?
        .ok_or_else(|| Error::Configuration {
            message: "billing settings are not configured; set the monthly fee first".to_string(),
        })?;
    if settings.monthly_fee <= Decimal::ZERO {
        return Err(Error::Configuration {
            message: format!(
                "monthly fee must be positive, found {}",
                settings.monthly_fee
            ),
        });
    }

    let month = Month::of(&now);
    let year = now.year();
    let mut created = 0u32;
    let mut skipped = 0u32;

    for member in store.list_members().await? {
        // Admins keep the books, they don't owe dues. Members enrolled in a
        // future period owe nothing yet.
        if member.role == MemberRole::Admin {
            continue;
        }
        if calculator::due_periods(member.enrolled_at, now) == 0 {
            continue;
        }

        let request = DuesRecordCreateRequest {
            member_id: member.id,
            month,
            year,
            amount: settings.monthly_fee,
            status: DuesStatus::Pending,
            paid_at: None,
            method: None,
            receipt_id: None,
        };
        match store.insert_dues_record(&request).await {
            Ok(_) => created += 1,
            Err(StoreError::DuplicatePeriod { .. }) => skipped += 1,
            Err(err) => return Err(err.into()),
        }
    }

    info!(%month, year, created, skipped, "billing generator pass complete");
    Ok(BillingRun {
        month,
        year,
        created,
        skipped,
    })
}

/// Background loop re-running the generator until shutdown.
///
/// The first tick fires immediately, so a freshly started service catches
/// up on the current period without waiting a full interval. Failures are
/// logged and retried on the next tick; an unset fee is the normal state of
/// a brand-new installation, not a reason to die.
pub async fn run_scheduler(
    store: Arc<dyn LedgerStore>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("billing scheduler shutting down");
                break;
            }
            _ = ticker.tick() => {
                match run_billing(store.as_ref(), Utc::now()).await {
                    Ok(run) if run.created > 0 => {
                        info!(created = run.created, skipped = run.skipped, "billing scheduler generated dues");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("billing scheduler pass failed: {err}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::store::models::MemberCreateRequest;
    use chrono::TimeZone;
    use rust_decimal::dec;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap()
    }

    async fn enroll(store: &MemoryStore, email: &str, role: MemberRole, enrolled_at: DateTime<Utc>) {
        store
            .enroll_member(
                &MemberCreateRequest {
                    name: email.to_string(),
                    email: email.to_string(),
                    phone: None,
                    role,
                    enrolled_at,
                },
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refuses_to_run_without_settings() {
        let store = MemoryStore::new();
        enroll(&store, "asha@example.com", MemberRole::Member, at(2024, 1, 1)).await;

        let err = run_billing(&store, at(2024, 8, 1)).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(store.list_dues(&Default::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refuses_to_run_with_non_positive_fee() {
        let store = MemoryStore::new();
        store.update_settings(dec!(0)).await.unwrap();
        enroll(&store, "asha@example.com", MemberRole::Member, at(2024, 1, 1)).await;

        let err = run_billing(&store, at(2024, 8, 1)).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn bills_members_but_not_admins_or_future_enrollments() {
        let store = MemoryStore::new();
        store.update_settings(dec!(500)).await.unwrap();
        enroll(&store, "asha@example.com", MemberRole::Member, at(2024, 3, 15)).await;
        enroll(&store, "ravi@example.com", MemberRole::Member, at(2022, 6, 1)).await;
        enroll(&store, "admin@example.com", MemberRole::Admin, at(2022, 1, 1)).await;
        enroll(&store, "late@example.com", MemberRole::Member, at(2024, 11, 1)).await;

        let run = run_billing(&store, at(2024, 8, 1)).await.unwrap();
        assert_eq!(run.created, 2);
        assert_eq!(run.skipped, 0);
        assert_eq!(run.month, Month::August);
        assert_eq!(run.year, 2024);

        let records = store.list_dues(&Default::default()).await.unwrap();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.amount, dec!(500));
            assert_eq!(record.status, DuesStatus::Pending);
            assert_eq!(record.month, Month::August);
        }
    }

    #[tokio::test]
    async fn second_pass_in_the_same_period_is_a_no_op() {
        let store = MemoryStore::new();
        store.update_settings(dec!(500)).await.unwrap();
        enroll(&store, "asha@example.com", MemberRole::Member, at(2024, 3, 15)).await;

        let first = run_billing(&store, at(2024, 8, 1)).await.unwrap();
        assert_eq!((first.created, first.skipped), (1, 0));

        let second = run_billing(&store, at(2024, 8, 20)).await.unwrap();
        assert_eq!((second.created, second.skipped), (0, 1));

        assert_eq!(store.list_dues(&Default::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_new_month_gets_its_own_records() {
        let store = MemoryStore::new();
        store.update_settings(dec!(500)).await.unwrap();
        enroll(&store, "asha@example.com", MemberRole::Member, at(2024, 3, 15)).await;

        run_billing(&store, at(2024, 8, 1)).await.unwrap();
        let next = run_billing(&store, at(2024, 9, 1)).await.unwrap();
        assert_eq!((next.created, next.skipped), (1, 0));
        assert_eq!(store.list_dues(&Default::default()).await.unwrap().len(), 2);
    }
}
