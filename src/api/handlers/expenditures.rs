use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    AppState,
    api::models::expenditures::{ExpenditureCreate, ExpenditureResponse},
    auth::current_user::AdminUser,
    errors::Error,
    store::models::ExpenditureCreateRequest,
    types::ExpenditureId,
};

/// Record an expenditure
#[utoipa::path(
    post,
    path = "/admin/api/v1/expenditures",
    request_body = ExpenditureCreate,
    tag = "expenditures",
    responses(
        (status = 201, description = "Expenditure recorded", body = ExpenditureResponse),
        (status = 400, description = "Invalid amount or empty description"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_expenditure(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<ExpenditureCreate>,
) -> Result<(StatusCode, Json<ExpenditureResponse>), Error> {
    if request.description.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "description must not be empty".to_string(),
        });
    }
    if request.amount <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "amount must be positive".to_string(),
        });
    }

    let create = ExpenditureCreateRequest {
        description: request.description,
        amount: request.amount,
        spent_at: request.spent_at.unwrap_or_else(Utc::now),
    };
    let expenditure = state.store.create_expenditure(&create).await?;
    Ok((StatusCode::CREATED, Json(expenditure.into())))
}

/// List expenditures
#[utoipa::path(
    get,
    path = "/admin/api/v1/expenditures",
    tag = "expenditures",
    responses(
        (status = 200, description = "Expenditures, most recent first", body = Vec<ExpenditureResponse>),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_expenditures(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ExpenditureResponse>>, Error> {
    let expenditures = state.store.list_expenditures().await?;
    Ok(Json(
        expenditures.into_iter().map(ExpenditureResponse::from).collect(),
    ))
}

/// Delete an expenditure
#[utoipa::path(
    delete,
    path = "/admin/api/v1/expenditures/{id}",
    tag = "expenditures",
    params(
        ("id" = String, Path, format = "uuid", description = "Expenditure id"),
    ),
    responses(
        (status = 204, description = "Expenditure deleted"),
        (status = 404, description = "No such expenditure"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(expenditure_id = %id))]
pub async fn delete_expenditure(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<ExpenditureId>,
) -> Result<StatusCode, Error> {
    state.store.delete_expenditure(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app, login_admin};
    use rust_decimal::dec;
    use serde_json::json;

    #[tokio::test]
    async fn recorded_spend_shows_up_in_the_list() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;

        let response = server
            .post("/admin/api/v1/expenditures")
            .json(&json!({"description": "Diwali decorations", "amount": 1200.50}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: ExpenditureResponse = response.json();
        assert_eq!(created.amount, dec!(1200.50));

        let listed: Vec<ExpenditureResponse> = server.get("/admin/api/v1/expenditures").await.json();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].description, "Diwali decorations");
    }

    #[tokio::test]
    async fn rejects_empty_description_and_bad_amounts() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;

        server
            .post("/admin/api/v1/expenditures")
            .json(&json!({"description": "   ", "amount": 100}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/admin/api/v1/expenditures")
            .json(&json!({"description": "Chairs", "amount": -5}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_the_entry() {
        let (server, _state) = create_test_app().await;
        login_admin(&server).await;

        let created: ExpenditureResponse = server
            .post("/admin/api/v1/expenditures")
            .json(&json!({"description": "Speaker rental", "amount": 800}))
            .await
            .json();

        server
            .delete(&format!("/admin/api/v1/expenditures/{}", created.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/admin/api/v1/expenditures/{}", created.id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
