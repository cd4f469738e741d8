//! PostgreSQL ledger storage.
//!
//! Production backend using sqlx with a connection pool. The database
//! enforces the invariants the memory store checks by hand: one dues record
//! per member and period via a unique constraint, member deletion cascading
//! to dues via the foreign key, and batch settlement wrapped in a
//! transaction.

use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::types::{DuesRecordId, ExpenditureId, MemberId, abbrev_uuid};

use super::models::{
    BillingSettings, DuesFilter, DuesRecord, DuesRecordCreateRequest, Expenditure,
    ExpenditureCreateRequest, InitialDues, Member, MemberCreateRequest, MemberUpdateRequest,
    Month, Settlement, User, UserCreateRequest,
};
use super::{LedgerStore, Result, StoreError};

/// PostgreSQL implementation of [`LedgerStore`].
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Translate an insert error, giving the caller a chance to map a unique
/// violation onto a domain error by constraint name.
fn map_insert_err(
    err: sqlx::Error,
    on_unique: impl FnOnce(&str) -> Option<StoreError>,
) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if let Some(mapped) = on_unique(&constraint) {
                return mapped;
            }
            return StoreError::UniqueViolation { constraint };
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::NotFound { entity: "member" };
        }
    }
    StoreError::Database(err)
}

#[async_trait::async_trait]
impl LedgerStore for PostgresStore {
    #[instrument(skip(self, user), err)]
    async fn create_user(&self, user: &UserCreateRequest) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash, is_admin, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, email, name, password_hash, is_admin, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            map_insert_err(err, |_| {
                Some(StoreError::DuplicateEmail {
                    email: user.email.clone(),
                })
            })
        })
    }

    #[instrument(skip(self, email), err)]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, is_admin, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, member, initial_dues), fields(name = %member.name), err)]
    async fn enroll_member(
        &self,
        member: &MemberCreateRequest,
        initial_dues: Option<&InitialDues>,
    ) -> Result<(Member, Option<DuesRecord>)> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (id, name, email, phone, role, enrolled_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING id, name, email, phone, role, enrolled_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(member.role)
        .bind(member.enrolled_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            map_insert_err(err, |constraint| match constraint {
                "members_email_key" => Some(StoreError::DuplicateEmail {
                    email: member.email.clone(),
                }),
                _ => None,
            })
        })?;

        let seeded = match initial_dues {
            Some(dues) => Some(
                insert_dues(
                    &mut tx,
                    &DuesRecordCreateRequest {
                        member_id: row.id,
                        month: dues.month,
                        year: dues.year,
                        amount: dues.amount,
                        status: super::models::DuesStatus::Pending,
                        paid_at: None,
                        method: None,
                        receipt_id: None,
                    },
                )
                .await?,
            ),
            None => None,
        };

        tx.commit().await?;
        Ok((row, seeded))
    }

    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn get_member(&self, id: MemberId) -> Result<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, name, email, phone, role, enrolled_at, created_at, updated_at
            FROM members
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    #[instrument(skip(self), err)]
    async fn list_members(&self) -> Result<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, name, email, phone, role, enrolled_at, created_at, updated_at
            FROM members
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    #[instrument(skip(self, update), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn update_member(&self, id: MemberId, update: &MemberUpdateRequest) -> Result<Member> {
        sqlx::query_as::<_, Member>(
            r#"
            UPDATE members
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, phone, role, enrolled_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { entity: "member" })
    }

    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn delete_member(&self, id: MemberId) -> Result<()> {
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "member" });
        }
        Ok(())
    }

    #[instrument(
        skip(self, record),
        fields(member_id = %abbrev_uuid(&record.member_id), month = %record.month, year = record.year),
        err
    )]
    async fn insert_dues_record(&self, record: &DuesRecordCreateRequest) -> Result<DuesRecord> {
        let mut tx = self.pool.begin().await?;
        let row = insert_dues(&mut tx, record).await?;
        tx.commit().await?;
        Ok(row)
    }

    #[instrument(skip(self), fields(record_id = %abbrev_uuid(&id)), err)]
    async fn get_dues_record(&self, id: DuesRecordId) -> Result<Option<DuesRecord>> {
        let record = sqlx::query_as::<_, DuesRecord>(
            r#"
            SELECT id, member_id, month, year, amount, status, paid_at, method,
                   receipt_id, gateway_payment_id, created_at
            FROM dues_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_dues_records(&self, ids: &[DuesRecordId]) -> Result<Vec<DuesRecord>> {
        let records = sqlx::query_as::<_, DuesRecord>(
            r#"
            SELECT id, member_id, month, year, amount, status, paid_at, method,
                   receipt_id, gateway_payment_id, created_at
            FROM dues_records
            WHERE id = ANY($1)
            ORDER BY created_at
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    #[instrument(skip(self, filter), err)]
    async fn list_dues(&self, filter: &DuesFilter) -> Result<Vec<DuesRecord>> {
        let records = sqlx::query_as::<_, DuesRecord>(
            r#"
            SELECT id, member_id, month, year, amount, status, paid_at, method,
                   receipt_id, gateway_payment_id, created_at
            FROM dues_records
            WHERE ($1::uuid IS NULL OR member_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::int4 IS NULL OR year = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.member_id)
        .bind(filter.status)
        .bind(filter.year)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    #[instrument(
        skip(self),
        fields(member_id = %abbrev_uuid(&member_id), month = %month, year = year),
        err
    )]
    async fn find_dues_record(
        &self,
        member_id: MemberId,
        month: Month,
        year: i32,
    ) -> Result<Option<DuesRecord>> {
        let record = sqlx::query_as::<_, DuesRecord>(
            r#"
            SELECT id, member_id, month, year, amount, status, paid_at, method,
                   receipt_id, gateway_payment_id, created_at
            FROM dues_records
            WHERE member_id = $1 AND month = $2 AND year = $3
            "#,
        )
        .bind(member_id)
        .bind(month)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, settlement), fields(record_id = %abbrev_uuid(&id)), err)]
    async fn settle_dues_record(
        &self,
        id: DuesRecordId,
        settlement: &Settlement,
    ) -> Result<DuesRecord> {
        let mut tx = self.pool.begin().await?;
        let row = settle_pending(&mut tx, id, settlement).await?;
        tx.commit().await?;
        Ok(row)
    }

    #[instrument(skip(self, ids, settlement), fields(count = ids.len()), err)]
    async fn settle_dues_batch(
        &self,
        ids: &[DuesRecordId],
        settlement: &Settlement,
    ) -> Result<Vec<DuesRecord>> {
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<_> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(unique.len());
        for id in unique {
            // Any failure drops the transaction and rolls the batch back.
            updated.push(settle_pending(&mut tx, id, settlement).await?);
        }
        tx.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self), fields(record_id = %abbrev_uuid(&id)), err)]
    async fn delete_dues_record(&self, id: DuesRecordId) -> Result<()> {
        let result = sqlx::query("DELETE FROM dues_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "dues record" });
        }
        Ok(())
    }

    #[instrument(skip(self, expenditure), fields(amount = %expenditure.amount), err)]
    async fn create_expenditure(
        &self,
        expenditure: &ExpenditureCreateRequest,
    ) -> Result<Expenditure> {
        let row = sqlx::query_as::<_, Expenditure>(
            r#"
            INSERT INTO expenditures (id, description, amount, spent_at, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, description, amount, spent_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&expenditure.description)
        .bind(expenditure.amount)
        .bind(expenditure.spent_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self), err)]
    async fn list_expenditures(&self) -> Result<Vec<Expenditure>> {
        let rows = sqlx::query_as::<_, Expenditure>(
            r#"
            SELECT id, description, amount, spent_at, created_at
            FROM expenditures
            ORDER BY spent_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(expenditure_id = %abbrev_uuid(&id)), err)]
    async fn delete_expenditure(&self, id: ExpenditureId) -> Result<()> {
        let result = sqlx::query("DELETE FROM expenditures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "expenditure" });
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_settings(&self) -> Result<Option<BillingSettings>> {
        let settings = sqlx::query_as::<_, BillingSettings>(
            "SELECT monthly_fee, updated_at FROM billing_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    #[instrument(skip(self), fields(monthly_fee = %monthly_fee), err)]
    async fn update_settings(&self, monthly_fee: Decimal) -> Result<BillingSettings> {
        let settings = sqlx::query_as::<_, BillingSettings>(
            r#"
            INSERT INTO billing_settings (id, monthly_fee, updated_at)
            VALUES (1, $1, NOW())
            ON CONFLICT (id) DO UPDATE
            SET monthly_fee = EXCLUDED.monthly_fee, updated_at = NOW()
            RETURNING monthly_fee, updated_at
            "#,
        )
        .bind(monthly_fee)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }
}

async fn insert_dues(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: &DuesRecordCreateRequest,
) -> Result<DuesRecord> {
    sqlx::query_as::<_, DuesRecord>(
        r#"
        INSERT INTO dues_records
            (id, member_id, month, year, amount, status, paid_at, method, receipt_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
        RETURNING id, member_id, month, year, amount, status, paid_at, method,
                  receipt_id, gateway_payment_id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.member_id)
    .bind(record.month)
    .bind(record.year)
    .bind(record.amount)
    .bind(record.status)
    .bind(record.paid_at)
    .bind(record.method)
    .bind(&record.receipt_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|err| {
        map_insert_err(err, |constraint| match constraint {
            "dues_records_member_period_key" => Some(StoreError::DuplicatePeriod {
                month: record.month,
                year: record.year,
            }),
            _ => None,
        })
    })
}

/// Flip one pending record to paid inside the caller's transaction,
/// distinguishing a missing record from one that is already settled.
async fn settle_pending(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: DuesRecordId,
    settlement: &Settlement,
) -> Result<DuesRecord> {
    let updated = sqlx::query_as::<_, DuesRecord>(
        r#"
        UPDATE dues_records
        SET status = $2,
            paid_at = $3,
            method = $4,
            receipt_id = COALESCE($5, receipt_id),
            gateway_payment_id = $6
        WHERE id = $1 AND status = $7
        RETURNING id, member_id, month, year, amount, status, paid_at, method,
                  receipt_id, gateway_payment_id, created_at
        "#,
    )
    .bind(id)
    .bind(super::models::DuesStatus::Paid)
    .bind(settlement.paid_at)
    .bind(settlement.method)
    .bind(&settlement.receipt_id)
    .bind(&settlement.gateway_payment_id)
    .bind(super::models::DuesStatus::Pending)
    .fetch_optional(&mut **tx)
    .await?;

    match updated {
        Some(row) => Ok(row),
        None => {
            let exists = sqlx::query("SELECT 1 FROM dues_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
            Err(match exists {
                Some(_) => StoreError::AlreadySettled { id },
                None => StoreError::NotFound { entity: "dues record" },
            })
        }
    }
}
