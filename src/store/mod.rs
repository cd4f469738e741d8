//! Persistence layer for the ledger.
//!
//! Everything the service knows about members, dues, expenditures, and
//! operator accounts goes through the [`LedgerStore`] trait. Two backends
//! implement it: an in-memory store for tests and single-process demo
//! deployments, and a Postgres store for real installations.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::types::{DuesRecordId, ExpenditureId, MemberId};
use models::{
    BillingSettings, DuesFilter, DuesRecord, DuesRecordCreateRequest, Expenditure,
    ExpenditureCreateRequest, InitialDues, Member, MemberCreateRequest, MemberUpdateRequest,
    Month, Settlement, User, UserCreateRequest,
};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested entity does not exist
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A dues record already exists for this member and billing period
    #[error("dues record already exists for {month} {year}")]
    DuplicatePeriod { month: Month, year: i32 },

    /// Another row already uses this email address
    #[error("email address already in use: {email}")]
    DuplicateEmail { email: String },

    /// The dues record has already been settled
    #[error("dues record {id} is already paid")]
    AlreadySettled { id: DuesRecordId },

    /// A unique constraint we don't specifically handle was violated
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal storage error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Storage trait for the membership ledger.
///
/// Implementations must make the multi-row operations atomic: enrolling a
/// member with its first dues record either commits both rows or neither,
/// and batch settlement marks every record paid or leaves all of them
/// untouched.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Operator accounts

    /// Create an operator account. Fails with [`StoreError::DuplicateEmail`]
    /// if the email is taken.
    async fn create_user(&self, user: &UserCreateRequest) -> Result<User>;

    /// Look up an operator account by email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // Members

    /// Enroll a member, optionally creating their first dues record in the
    /// same transaction.
    ///
    /// # Errors
    /// - [`StoreError::DuplicateEmail`] if a member with this email exists
    /// - [`StoreError::DuplicatePeriod`] if the seed dues record collides
    async fn enroll_member(
        &self,
        member: &MemberCreateRequest,
        initial_dues: Option<&InitialDues>,
    ) -> Result<(Member, Option<DuesRecord>)>;

    async fn get_member(&self, id: MemberId) -> Result<Option<Member>>;

    /// List all members, ordered by name.
    async fn list_members(&self) -> Result<Vec<Member>>;

    /// Apply a partial update to a member. `None` fields are left untouched.
    async fn update_member(&self, id: MemberId, update: &MemberUpdateRequest) -> Result<Member>;

    /// Delete a member and, via cascade, every dues record attached to them.
    async fn delete_member(&self, id: MemberId) -> Result<()>;

    // Dues records

    /// Insert a pending dues record.
    ///
    /// # Errors
    /// - [`StoreError::DuplicatePeriod`] if the member already has a record
    ///   for this month and year
    async fn insert_dues_record(&self, record: &DuesRecordCreateRequest) -> Result<DuesRecord>;

    async fn get_dues_record(&self, id: DuesRecordId) -> Result<Option<DuesRecord>>;

    /// Fetch a batch of dues records by ID. IDs with no matching row are
    /// silently absent from the result.
    async fn get_dues_records(&self, ids: &[DuesRecordId]) -> Result<Vec<DuesRecord>>;

    /// List dues records matching the filter, newest first.
    async fn list_dues(&self, filter: &DuesFilter) -> Result<Vec<DuesRecord>>;

    /// Find the dues record for a specific member and billing period.
    async fn find_dues_record(
        &self,
        member_id: MemberId,
        month: Month,
        year: i32,
    ) -> Result<Option<DuesRecord>>;

    /// Mark a single pending record as paid.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] if the record doesn't exist
    /// - [`StoreError::AlreadySettled`] if it is already paid
    async fn settle_dues_record(
        &self,
        id: DuesRecordId,
        settlement: &Settlement,
    ) -> Result<DuesRecord>;

    /// Atomically mark a batch of pending records as paid. If any record is
    /// missing or already paid the whole batch is rolled back.
    async fn settle_dues_batch(
        &self,
        ids: &[DuesRecordId],
        settlement: &Settlement,
    ) -> Result<Vec<DuesRecord>>;

    async fn delete_dues_record(&self, id: DuesRecordId) -> Result<()>;

    // Expenditures

    async fn create_expenditure(&self, expenditure: &ExpenditureCreateRequest)
        -> Result<Expenditure>;

    /// List expenditures, most recent spend first.
    async fn list_expenditures(&self) -> Result<Vec<Expenditure>>;

    async fn delete_expenditure(&self, id: ExpenditureId) -> Result<()>;

    // Billing settings

    /// Read the billing settings. `None` until an admin has saved them.
    async fn get_settings(&self) -> Result<Option<BillingSettings>>;

    /// Create or replace the billing settings.
    async fn update_settings(&self, monthly_fee: Decimal) -> Result<BillingSettings>;
}
