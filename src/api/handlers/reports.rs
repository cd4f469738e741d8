use axum::{Json, extract::State};
use chrono::Utc;

use crate::{
    AppState,
    auth::current_user::AdminUser,
    errors::Error,
    reports::{FinancialSummary, summarize},
    store::models::DuesFilter,
};

/// Get the financial summary
///
/// Recomputed from the ledger on every read; nothing is cached.
#[utoipa::path(
    get,
    path = "/admin/api/v1/reports/summary",
    tag = "reports",
    responses(
        (status = 200, description = "Collected, pending, spent, and per-period totals", body = FinancialSummary),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_summary(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<FinancialSummary>, Error> {
    let members = state.store.list_members().await?;
    let dues = state.store.list_dues(&DuesFilter::default()).await?;
    let expenditures = state.store.list_expenditures().await?;

    let monthly_fee = match state.store.get_settings().await? {
        Some(settings) => settings.monthly_fee,
        None => state.config.billing.default_display_fee,
    };

    let summary = summarize(&members, &dues, &expenditures, monthly_fee, Utc::now());
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::members::EnrollmentResponse;
    use crate::test_utils::{create_test_app, login_admin, set_monthly_fee};
    use rust_decimal::dec;
    use serde_json::json;

    #[tokio::test]
    async fn summary_balances_collections_against_spend() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;
        set_monthly_fee(&server, dec!(500)).await;

        let enrolled: EnrollmentResponse = server
            .post("/admin/api/v1/members")
            .json(&json!({"name": "Asha Nair", "email": "asha@example.com"}))
            .await
            .json();
        let opening = enrolled.initial_dues.unwrap();

        // Settle the opening period and record some spend
        server
            .post("/admin/api/v1/dues/manual")
            .json(&json!({
                "member_id": enrolled.member.id,
                "month": opening.month,
                "year": opening.year
            }))
            .await
            .assert_status_ok();
        server
            .post("/admin/api/v1/expenditures")
            .json(&json!({"description": "Hall rent", "amount": 300}))
            .await;

        let summary: FinancialSummary = server.get("/admin/api/v1/reports/summary").await.json();
        assert_eq!(summary.total_collected, dec!(500));
        assert_eq!(summary.total_pending, dec!(0));
        assert_eq!(summary.total_expenditure, dec!(300));
        assert_eq!(summary.net_balance, dec!(200));

        let bucket = summary
            .period_totals
            .iter()
            .find(|bucket| bucket.month == opening.month && bucket.year == opening.year)
            .expect("settled period should have a bucket");
        assert_eq!(bucket.collected, dec!(500));
        assert_eq!(bucket.pending, dec!(0));
    }

    #[tokio::test]
    async fn empty_ledger_summarizes_to_zero() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;

        let summary: FinancialSummary = server.get("/admin/api/v1/reports/summary").await.json();
        assert_eq!(summary.total_collected, dec!(0));
        assert_eq!(summary.total_pending, dec!(0));
        assert_eq!(summary.total_expenditure, dec!(0));
        assert_eq!(summary.net_balance, dec!(0));
        assert!(summary.period_totals.is_empty());
    }
}
