use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::models::dues::{
        BackfillDuesRequest, DuesRecordResponse, ListDuesQuery, ManualPaymentRequest,
    },
    auth::current_user::AdminUser,
    errors::Error,
    gateway::new_receipt_id,
    store::models::{DuesFilter, DuesRecordCreateRequest, DuesStatus, PaymentMethod, Settlement},
    types::DuesRecordId,
};

/// List dues records
#[utoipa::path(
    get,
    path = "/admin/api/v1/dues",
    tag = "dues",
    params(ListDuesQuery),
    responses(
        (status = 200, description = "Dues records, newest first", body = Vec<DuesRecordResponse>),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_dues(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListDuesQuery>,
) -> Result<Json<Vec<DuesRecordResponse>>, Error> {
    let filter = DuesFilter {
        member_id: query.member_id,
        status: query.status,
        year: query.year,
    };
    let records = state.store.list_dues(&filter).await?;
    Ok(Json(records.into_iter().map(DuesRecordResponse::from).collect()))
}

/// Record a cash payment against a billed period
#[utoipa::path(
    post,
    path = "/admin/api/v1/dues/manual",
    request_body = ManualPaymentRequest,
    tag = "dues",
    responses(
        (status = 200, description = "Record settled", body = DuesRecordResponse),
        (status = 400, description = "Amount does not match the billed amount"),
        (status = 404, description = "No record for that member and period"),
        (status = 409, description = "Period already settled"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(member_id = %request.member_id, month = %request.month, year = request.year))]
pub async fn record_manual_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<ManualPaymentRequest>,
) -> Result<Json<DuesRecordResponse>, Error> {
    let record = state
        .store
        .find_dues_record(request.member_id, request.month, request.year)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "dues record".to_string(),
            id: format!("{} {} for member {}", request.month, request.year, request.member_id),
        })?;

    // The billed amount is history; a mismatched instruction is a typo, not
    // an adjustment.
    if let Some(amount) = request.amount {
        if amount != record.amount {
            return Err(Error::BadRequest {
                message: format!(
                    "amount {} does not match the billed amount {}",
                    amount, record.amount
                ),
            });
        }
    }

    let settlement = Settlement {
        method: PaymentMethod::Cash,
        paid_at: request.paid_at.unwrap_or_else(Utc::now),
        receipt_id: Some(new_receipt_id()),
        gateway_payment_id: None,
    };

    let settled = state.store.settle_dues_record(record.id, &settlement).await?;
    Ok(Json(settled.into()))
}

/// Backfill a period the generator never billed
#[utoipa::path(
    post,
    path = "/admin/api/v1/dues/backfill",
    request_body = BackfillDuesRequest,
    tag = "dues",
    responses(
        (status = 201, description = "Record created", body = DuesRecordResponse),
        (status = 400, description = "Invalid amount or settlement fields"),
        (status = 404, description = "No such member"),
        (status = 409, description = "Period already recorded"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(member_id = %request.member_id, month = %request.month, year = request.year))]
pub async fn backfill_dues(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<BackfillDuesRequest>,
) -> Result<(StatusCode, Json<DuesRecordResponse>), Error> {
    if request.amount <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "amount must be positive".to_string(),
        });
    }

    if state.store.get_member(request.member_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "member".to_string(),
            id: request.member_id.to_string(),
        });
    }

    let status = request.status.unwrap_or(DuesStatus::Paid);
    if status == DuesStatus::Pending && (request.paid_at.is_some() || request.method.is_some()) {
        return Err(Error::BadRequest {
            message: "settlement fields require status \"paid\"".to_string(),
        });
    }

    let create = match status {
        DuesStatus::Paid => DuesRecordCreateRequest {
            member_id: request.member_id,
            month: request.month,
            year: request.year,
            amount: request.amount,
            status,
            paid_at: Some(request.paid_at.unwrap_or_else(Utc::now)),
            method: Some(request.method.unwrap_or(PaymentMethod::Cash)),
            receipt_id: Some(new_receipt_id()),
        },
        DuesStatus::Pending => DuesRecordCreateRequest {
            member_id: request.member_id,
            month: request.month,
            year: request.year,
            amount: request.amount,
            status,
            paid_at: None,
            method: None,
            receipt_id: None,
        },
    };

    let record = state.store.insert_dues_record(&create).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Delete a dues record
#[utoipa::path(
    delete,
    path = "/admin/api/v1/dues/{id}",
    tag = "dues",
    params(
        ("id" = String, Path, format = "uuid", description = "Dues record id"),
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "No such record"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(record_id = %id))]
pub async fn delete_dues_record(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<DuesRecordId>,
) -> Result<StatusCode, Error> {
    state.store.delete_dues_record(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::members::EnrollmentResponse;
    use crate::test_utils::{create_test_app, login_admin, set_monthly_fee};
    use rust_decimal::dec;
    use serde_json::json;

    async fn enroll(server: &axum_test::TestServer, email: &str) -> EnrollmentResponse {
        server
            .post("/admin/api/v1/members")
            .json(&json!({"name": "Asha Nair", "email": email}))
            .await
            .json()
    }

    #[tokio::test]
    async fn manual_payment_settles_a_pending_period() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;
        let opening = enrolled.initial_dues.unwrap();

        let response = server
            .post("/admin/api/v1/dues/manual")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": opening.month,
                "year": opening.year,
                "amount": 500
            }))
            .await;
        response.assert_status_ok();

        let settled: DuesRecordResponse = response.json();
        assert_eq!(settled.id, opening.id);
        assert_eq!(settled.status, DuesStatus::Paid);
        assert_eq!(settled.method, Some(PaymentMethod::Cash));
        assert!(settled.paid_at.is_some());
        assert!(settled.receipt_id.unwrap().starts_with("rcpt_"));
    }

    #[tokio::test]
    async fn settling_twice_conflicts_and_keeps_the_ledger() {
        let (server, state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;
        let opening = enrolled.initial_dues.unwrap();
        let instruction = json!({
            "member_id": enrolled.member.id,
            "month": opening.month,
            "year": opening.year
        });

        server
            .post("/admin/api/v1/dues/manual")
            .json(&instruction)
            .await
            .assert_status_ok();
        let first = state.store.get_dues_record(opening.id).await.unwrap().unwrap();

        server
            .post("/admin/api/v1/dues/manual")
            .json(&instruction)
            .await
            .assert_status(StatusCode::CONFLICT);

        // Replay changed nothing: same receipt, same timestamp
        let second = state.store.get_dues_record(opening.id).await.unwrap().unwrap();
        assert_eq!(second.receipt_id, first.receipt_id);
        assert_eq!(second.paid_at, first.paid_at);
    }

    #[tokio::test]
    async fn manual_payment_checks_amount_and_existence() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;
        let opening = enrolled.initial_dues.unwrap();

        server
            .post("/admin/api/v1/dues/manual")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": opening.month,
                "year": opening.year,
                "amount": 450
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/admin/api/v1/dues/manual")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": "January",
                "year": 1999
            }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn backfill_records_an_offline_payment() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;

        let response = server
            .post("/admin/api/v1/dues/backfill")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": "January",
                "year": 2024,
                "amount": 500
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let record: DuesRecordResponse = response.json();
        assert_eq!(record.status, DuesStatus::Paid);
        assert_eq!(record.method, Some(PaymentMethod::Cash));
        assert!(record.paid_at.is_some());

        // Same period again conflicts
        server
            .post("/admin/api/v1/dues/backfill")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": "January",
                "year": 2024,
                "amount": 500
            }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn backfill_validates_its_input() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;

        server
            .post("/admin/api/v1/dues/backfill")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": "January",
                "year": 2024,
                "amount": 0
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/admin/api/v1/dues/backfill")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": "January",
                "year": 2024,
                "amount": 500,
                "status": "pending",
                "method": "cash"
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/admin/api/v1/dues/backfill")
            .json(&json!({
                "member_id": uuid::Uuid::new_v4(),
                "month": "January",
                "year": 2024,
                "amount": 500
            }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pending_backfill_carries_no_settlement() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;

        let response = server
            .post("/admin/api/v1/dues/backfill")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": "February",
                "year": 2024,
                "amount": 500,
                "status": "pending"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let record: DuesRecordResponse = response.json();
        assert_eq!(record.status, DuesStatus::Pending);
        assert!(record.paid_at.is_none());
        assert!(record.method.is_none());
        assert!(record.receipt_id.is_none());
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_year() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;
        server
            .post("/admin/api/v1/dues/backfill")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": "January",
                "year": 2024,
                "amount": 500
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let paid: Vec<DuesRecordResponse> = server
            .get("/admin/api/v1/dues")
            .add_query_param("status", "paid")
            .await
            .json();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].year, 2024);

        let that_year: Vec<DuesRecordResponse> = server
            .get("/admin/api/v1/dues")
            .add_query_param("year", "2024")
            .await
            .json();
        assert!(that_year.iter().all(|record| record.year == 2024));

        let by_member: Vec<DuesRecordResponse> = server
            .get("/admin/api/v1/dues")
            .add_query_param("member_id", enrolled.member.id.to_string())
            .await
            .json();
        assert_eq!(by_member.len(), 2);
    }

    #[tokio::test]
    async fn deleting_a_record_removes_it() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled = enroll(&server, "asha@example.com").await;
        let opening = enrolled.initial_dues.unwrap();

        server
            .delete(&format!("/admin/api/v1/dues/{}", opening.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/admin/api/v1/dues/{}", opening.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
