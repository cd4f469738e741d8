//! OpenAPI documentation for the duebook API.
//!
//! The document is served as raw JSON at `/api-docs/openapi.json` and rendered
//! by Scalar at `/docs`. The gateway webhook endpoint is deliberately absent:
//! it is called by the payment provider, not by API clients.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, billing, reports, store};

/// Security scheme for the admin API (JWT session cookie).
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "session_token".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "duebook_session",
                    "JWT session cookie issued by `POST /authentication/login`. \
                     The cookie name is configurable; this is the default.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SessionSecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::members::create_member,
        api::handlers::members::list_members,
        api::handlers::members::get_member,
        api::handlers::members::update_member,
        api::handlers::members::delete_member,
        api::handlers::members::list_member_dues,
        api::handlers::dues::list_dues,
        api::handlers::dues::record_manual_payment,
        api::handlers::dues::backfill_dues,
        api::handlers::dues::delete_dues_record,
        api::handlers::expenditures::create_expenditure,
        api::handlers::expenditures::list_expenditures,
        api::handlers::expenditures::delete_expenditure,
        api::handlers::settings::get_settings,
        api::handlers::settings::update_settings,
        api::handlers::reports::get_summary,
        api::handlers::billing::run,
        api::handlers::orders::create_order,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::CurrentUser,
            api::models::auth::UserResponse,
            api::models::auth::AuthResponse,
            api::models::auth::AuthSuccessResponse,
            api::models::members::MemberCreate,
            api::models::members::MemberUpdate,
            api::models::members::MemberResponse,
            api::models::members::EnrollmentResponse,
            api::models::members::MemberDetailResponse,
            api::models::dues::DuesRecordResponse,
            api::models::dues::ManualPaymentRequest,
            api::models::dues::BackfillDuesRequest,
            api::models::expenditures::ExpenditureCreate,
            api::models::expenditures::ExpenditureResponse,
            api::models::settings::SettingsUpdate,
            api::models::settings::SettingsResponse,
            api::models::orders::OrderRequest,
            api::models::orders::OrderResponse,
            billing::DueSummary,
            billing::BillingRun,
            reports::FinancialSummary,
            reports::PeriodTotals,
            store::models::Month,
            store::models::MemberRole,
            store::models::DuesStatus,
            store::models::PaymentMethod,
        )
    ),
    tags(
        (name = "authentication", description = "Session management for admin operators."),
        (name = "members", description = "Member enrollment, accounts, and per-member dues."),
        (name = "dues", description = "The dues ledger: listing, manual settlement, backfill."),
        (name = "expenditures", description = "Committee spending records."),
        (name = "settings", description = "The monthly fee singleton."),
        (name = "reports", description = "Financial rollups for the dashboard."),
        (name = "billing", description = "On-demand dues generation."),
        (name = "orders", description = "Member-facing payment link creation. No session required."),
    ),
    info(
        title = "duebook API",
        description = "Membership dues tracking and collection for small committees.

## Authentication

Admin endpoints under `/admin/api/v1` require a JWT session cookie obtained
from `POST /authentication/login`. `POST /orders` is member-facing and open;
dues records are referenced by unguessable UUIDs.

## Errors

Errors are returned as plain-text bodies with conventional status codes:
400 for invalid requests, 401/403 for missing or insufficient authentication,
404 for unknown resources, 409 for ledger conflicts (duplicate periods,
double settlement), and 5xx for configuration or storage failures.",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds_with_session_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components should exist");
        assert!(components.security_schemes.contains_key("session_token"));
        assert!(doc.paths.paths.contains_key("/admin/api/v1/members"));
        // The webhook is provider-facing and stays out of the client docs.
        assert!(!doc.paths.paths.contains_key("/webhooks/payment"));
    }
}
