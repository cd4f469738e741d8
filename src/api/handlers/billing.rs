use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    auth::current_user::AdminUser,
    billing::{BillingRun, run_billing},
    errors::Error,
};

/// Generate dues records for the current period
///
/// Safe to call repeatedly; periods that already have a record are skipped.
#[utoipa::path(
    get,
    path = "/admin/api/v1/billing/run",
    tag = "billing",
    responses(
        (status = 200, description = "Created and skipped counts", body = BillingRun),
        (status = 500, description = "Monthly fee not configured"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn run(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<BillingRun>, Error> {
    let run = run_billing(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::dues::DuesRecordResponse;
    use crate::api::models::members::EnrollmentResponse;
    use crate::test_utils::{create_test_app, login_admin, set_monthly_fee};
    use axum::http::StatusCode;
    use rust_decimal::dec;
    use serde_json::json;

    #[tokio::test]
    async fn unconfigured_fee_fails_the_run() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;

        server
            .get("/admin/api/v1/billing/run")
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn second_run_in_the_same_period_is_a_noop() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        // Enrollment already seeds the current period, so the first run
        // skips the enrolled member rather than double-billing them.
        let enrolled: EnrollmentResponse = server
            .post("/admin/api/v1/members")
            .json(&json!({"name": "Asha Nair", "email": "asha@example.com"}))
            .await
            .json();

        let first: BillingRun = server.get("/admin/api/v1/billing/run").await.json();
        assert_eq!(first.created, 0);
        assert_eq!(first.skipped, 1);

        let second: BillingRun = server.get("/admin/api/v1/billing/run").await.json();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 1);

        let records: Vec<DuesRecordResponse> = server
            .get(&format!("/admin/api/v1/members/{}/dues", enrolled.member.id))
            .await
            .json();
        assert_eq!(records.len(), 1);
    }
}
