//! In-memory ledger storage.
//!
//! Keeps everything in hash maps behind a single lock. Suitable for tests
//! and throwaway deployments; all data is lost on restart. One lock for the
//! whole ledger keeps the multi-row operations (enrollment with a seed dues
//! record, batch settlement) trivially atomic.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{DuesRecordId, ExpenditureId, MemberId};

use super::models::{
    BillingSettings, DuesFilter, DuesRecord, DuesRecordCreateRequest, DuesStatus, Expenditure,
    ExpenditureCreateRequest, InitialDues, Member, MemberCreateRequest, MemberUpdateRequest,
    Month, Settlement, User, UserCreateRequest,
};
use super::{LedgerStore, Result, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    members: HashMap<MemberId, Member>,
    dues: HashMap<DuesRecordId, DuesRecord>,
    expenditures: HashMap<ExpenditureId, Expenditure>,
    settings: Option<BillingSettings>,
}

impl Inner {
    fn period_taken(&self, member_id: MemberId, month: Month, year: i32) -> bool {
        self.dues
            .values()
            .any(|r| r.member_id == member_id && r.month == month && r.year == year)
    }

    fn insert_dues(&mut self, record: &DuesRecordCreateRequest) -> Result<DuesRecord> {
        if !self.members.contains_key(&record.member_id) {
            return Err(StoreError::NotFound { entity: "member" });
        }
        if self.period_taken(record.member_id, record.month, record.year) {
            return Err(StoreError::DuplicatePeriod {
                month: record.month,
                year: record.year,
            });
        }
        let row = DuesRecord {
            id: Uuid::new_v4(),
            member_id: record.member_id,
            month: record.month,
            year: record.year,
            amount: record.amount,
            status: record.status,
            paid_at: record.paid_at,
            method: record.method,
            receipt_id: record.receipt_id.clone(),
            gateway_payment_id: None,
            created_at: Utc::now(),
        };
        self.dues.insert(row.id, row.clone());
        Ok(row)
    }

    fn settle(&mut self, id: DuesRecordId, settlement: &Settlement) -> Result<DuesRecord> {
        let record = self
            .dues
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "dues record" })?;
        if record.status == DuesStatus::Paid {
            return Err(StoreError::AlreadySettled { id });
        }
        record.status = DuesStatus::Paid;
        record.paid_at = Some(settlement.paid_at);
        record.method = Some(settlement.method);
        record.gateway_payment_id = settlement.gateway_payment_id.clone();
        if settlement.receipt_id.is_some() {
            record.receipt_id = settlement.receipt_id.clone();
        }
        Ok(record.clone())
    }
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryStore {
    async fn create_user(&self, user: &UserCreateRequest) -> Result<User> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail {
                email: user.email.clone(),
            });
        }
        let row = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            is_admin: user.is_admin,
            created_at: Utc::now(),
        };
        inner.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn enroll_member(
        &self,
        member: &MemberCreateRequest,
        initial_dues: Option<&InitialDues>,
    ) -> Result<(Member, Option<DuesRecord>)> {
        let mut inner = self.inner.write().await;
        if inner.members.values().any(|m| m.email == member.email) {
            return Err(StoreError::DuplicateEmail {
                email: member.email.clone(),
            });
        }
        let now = Utc::now();
        let row = Member {
            id: Uuid::new_v4(),
            name: member.name.clone(),
            email: member.email.clone(),
            phone: member.phone.clone(),
            role: member.role,
            enrolled_at: member.enrolled_at,
            created_at: now,
            updated_at: now,
        };
        let seeded = initial_dues.map(|dues| DuesRecord {
            id: Uuid::new_v4(),
            member_id: row.id,
            month: dues.month,
            year: dues.year,
            amount: dues.amount,
            status: DuesStatus::Pending,
            paid_at: None,
            method: None,
            receipt_id: None,
            gateway_payment_id: None,
            created_at: now,
        });
        inner.members.insert(row.id, row.clone());
        if let Some(dues) = &seeded {
            inner.dues.insert(dues.id, dues.clone());
        }
        Ok((row, seeded))
    }

    async fn get_member(&self, id: MemberId) -> Result<Option<Member>> {
        let inner = self.inner.read().await;
        Ok(inner.members.get(&id).cloned())
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        let inner = self.inner.read().await;
        let mut members: Vec<_> = inner.members.values().cloned().collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    async fn update_member(&self, id: MemberId, update: &MemberUpdateRequest) -> Result<Member> {
        let mut inner = self.inner.write().await;
        let member = inner
            .members
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "member" })?;
        if let Some(name) = &update.name {
            member.name = name.clone();
        }
        if let Some(phone) = &update.phone {
            member.phone = Some(phone.clone());
        }
        member.updated_at = Utc::now();
        Ok(member.clone())
    }

    async fn delete_member(&self, id: MemberId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.members.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "member" });
        }
        inner.dues.retain(|_, r| r.member_id != id);
        Ok(())
    }

    async fn insert_dues_record(&self, record: &DuesRecordCreateRequest) -> Result<DuesRecord> {
        let mut inner = self.inner.write().await;
        inner.insert_dues(record)
    }

    async fn get_dues_record(&self, id: DuesRecordId) -> Result<Option<DuesRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.dues.get(&id).cloned())
    }

    async fn get_dues_records(&self, ids: &[DuesRecordId]) -> Result<Vec<DuesRecord>> {
        let inner = self.inner.read().await;
        let mut seen = std::collections::HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| inner.dues.get(id).cloned())
            .collect())
    }

    async fn list_dues(&self, filter: &DuesFilter) -> Result<Vec<DuesRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<_> = inner
            .dues
            .values()
            .filter(|r| filter.member_id.is_none_or(|id| r.member_id == id))
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| filter.year.is_none_or(|y| r.year == y))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn find_dues_record(
        &self,
        member_id: MemberId,
        month: Month,
        year: i32,
    ) -> Result<Option<DuesRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .dues
            .values()
            .find(|r| r.member_id == member_id && r.month == month && r.year == year)
            .cloned())
    }

    async fn settle_dues_record(
        &self,
        id: DuesRecordId,
        settlement: &Settlement,
    ) -> Result<DuesRecord> {
        let mut inner = self.inner.write().await;
        inner.settle(id, settlement)
    }

    async fn settle_dues_batch(
        &self,
        ids: &[DuesRecordId],
        settlement: &Settlement,
    ) -> Result<Vec<DuesRecord>> {
        let mut inner = self.inner.write().await;
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<_> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        // Validate the whole batch before touching anything so a bad id
        // leaves every record untouched.
        for id in &unique {
            let record = inner
                .dues
                .get(id)
                .ok_or(StoreError::NotFound { entity: "dues record" })?;
            if record.status == DuesStatus::Paid {
                return Err(StoreError::AlreadySettled { id: *id });
            }
        }
        unique
            .iter()
            .map(|id| inner.settle(*id, settlement))
            .collect()
    }

    async fn delete_dues_record(&self, id: DuesRecordId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.dues.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "dues record" });
        }
        Ok(())
    }

    async fn create_expenditure(
        &self,
        expenditure: &ExpenditureCreateRequest,
    ) -> Result<Expenditure> {
        let mut inner = self.inner.write().await;
        let row = Expenditure {
            id: Uuid::new_v4(),
            description: expenditure.description.clone(),
            amount: expenditure.amount,
            spent_at: expenditure.spent_at,
            created_at: Utc::now(),
        };
        inner.expenditures.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_expenditures(&self) -> Result<Vec<Expenditure>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner.expenditures.values().cloned().collect();
        rows.sort_by(|a, b| b.spent_at.cmp(&a.spent_at));
        Ok(rows)
    }

    async fn delete_expenditure(&self, id: ExpenditureId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.expenditures.remove(&id).is_none() {
            return Err(StoreError::NotFound { entity: "expenditure" });
        }
        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<BillingSettings>> {
        let inner = self.inner.read().await;
        Ok(inner.settings.clone())
    }

    async fn update_settings(&self, monthly_fee: Decimal) -> Result<BillingSettings> {
        let mut inner = self.inner.write().await;
        let settings = BillingSettings {
            monthly_fee,
            updated_at: Utc::now(),
        };
        inner.settings = Some(settings.clone());
        Ok(settings)
    }
}
