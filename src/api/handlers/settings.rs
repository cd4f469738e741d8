use axum::{Json, extract::State};
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::models::settings::{SettingsResponse, SettingsUpdate},
    auth::current_user::AdminUser,
    errors::Error,
};

/// Get the billing settings
#[utoipa::path(
    get,
    path = "/admin/api/v1/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Current billing settings", body = SettingsResponse),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<SettingsResponse>, Error> {
    let response = match state.store.get_settings().await? {
        Some(settings) => SettingsResponse {
            monthly_fee: settings.monthly_fee,
            configured: true,
            updated_at: Some(settings.updated_at),
        },
        None => SettingsResponse {
            monthly_fee: state.config.billing.default_display_fee,
            configured: false,
            updated_at: None,
        },
    };
    Ok(Json(response))
}

/// Set the monthly fee
#[utoipa::path(
    put,
    path = "/admin/api/v1/settings",
    request_body = SettingsUpdate,
    tag = "settings",
    responses(
        (status = 200, description = "Settings updated", body = SettingsResponse),
        (status = 400, description = "Fee below 1"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(monthly_fee = %request.monthly_fee))]
pub async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>, Error> {
    if request.monthly_fee < Decimal::ONE {
        return Err(Error::BadRequest {
            message: "monthly fee must be at least 1".to_string(),
        });
    }

    let settings = state.store.update_settings(request.monthly_fee).await?;
    Ok(Json(SettingsResponse {
        monthly_fee: settings.monthly_fee,
        configured: true,
        updated_at: Some(settings.updated_at),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app, login_admin};
    use axum::http::StatusCode;
    use rust_decimal::dec;
    use serde_json::json;

    #[tokio::test]
    async fn unset_fee_reads_as_unconfigured_default() {
        let (server, state) = create_test_app().await;
        login_admin(&server).await;

        let response: SettingsResponse = server.get("/admin/api/v1/settings").await.json();
        assert!(!response.configured);
        assert_eq!(response.monthly_fee, state.config.billing.default_display_fee);
        assert!(response.updated_at.is_none());
    }

    #[tokio::test]
    async fn updating_the_fee_persists() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;

        let updated: SettingsResponse = server
            .put("/admin/api/v1/settings")
            .json(&json!({"monthly_fee": 750}))
            .await
            .json();
        assert!(updated.configured);
        assert_eq!(updated.monthly_fee, dec!(750));
        assert!(updated.updated_at.is_some());

        let read_back: SettingsResponse = server.get("/admin/api/v1/settings").await.json();
        assert!(read_back.configured);
        assert_eq!(read_back.monthly_fee, dec!(750));
    }

    #[tokio::test]
    async fn fee_below_one_is_rejected() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;

        server
            .put("/admin/api/v1/settings")
            .json(&json!({"monthly_fee": 0.5}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
