use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Datelike, Utc};

use crate::{
    AppState,
    api::models::{
        dues::DuesRecordResponse,
        members::{
            EnrollmentResponse, MemberCreate, MemberDetailResponse, MemberResponse, MemberUpdate,
        },
    },
    auth::current_user::AdminUser,
    billing::due_summary,
    errors::Error,
    store::models::{DuesFilter, InitialDues, MemberCreateRequest, MemberRole, MemberUpdateRequest, Month},
    types::MemberId,
};

/// Enroll a new member
///
/// Members get an opening `Pending` dues record for the current period in the
/// same write; admins keep the books and are never billed.
#[utoipa::path(
    post,
    path = "/admin/api/v1/members",
    request_body = MemberCreate,
    tag = "members",
    responses(
        (status = 201, description = "Member enrolled", body = EnrollmentResponse),
        (status = 409, description = "Email already enrolled"),
        (status = 500, description = "Monthly fee not configured"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn create_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<MemberCreate>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), Error> {
    let now = Utc::now();

    let initial_dues = if request.role == MemberRole::Member {
        let settings =
            state
                .store
                .get_settings()
                .await?
                .ok_or_else(|| Error::Configuration {
                    message: "billing settings are not configured; set the monthly fee before enrolling members"
                        .to_string(),
                })?;
        Some(InitialDues {
            month: Month::of(&now),
            year: now.year(),
            amount: settings.monthly_fee,
        })
    } else {
        None
    };

    let create = MemberCreateRequest {
        name: request.name,
        email: request.email,
        phone: request.phone,
        role: request.role,
        enrolled_at: request.enrolled_at.unwrap_or(now),
    };

    let (member, opening_record) = state
        .store
        .enroll_member(&create, initial_dues.as_ref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(EnrollmentResponse {
            member: member.into(),
            initial_dues: opening_record.map(DuesRecordResponse::from),
        }),
    ))
}

/// List all members
#[utoipa::path(
    get,
    path = "/admin/api/v1/members",
    tag = "members",
    responses(
        (status = 200, description = "All members", body = Vec<MemberResponse>),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_members(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<MemberResponse>>, Error> {
    let members = state.store.list_members().await?;
    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// Get one member with their account summary
#[utoipa::path(
    get,
    path = "/admin/api/v1/members/{id}",
    tag = "members",
    params(
        ("id" = String, Path, format = "uuid", description = "Member id"),
    ),
    responses(
        (status = 200, description = "Member with due summary", body = MemberDetailResponse),
        (status = 404, description = "No such member"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(member_id = %id))]
pub async fn get_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<MemberId>,
) -> Result<Json<MemberDetailResponse>, Error> {
    let member = state
        .store
        .get_member(id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "member".to_string(),
            id: id.to_string(),
        })?;

    let records = state
        .store
        .list_dues(&DuesFilter {
            member_id: Some(id),
            ..Default::default()
        })
        .await?;

    // Read-only display path: an unset fee falls back to the configured
    // default instead of erroring.
    let monthly_fee = match state.store.get_settings().await? {
        Some(settings) => settings.monthly_fee,
        None => state.config.billing.default_display_fee,
    };

    let summary = due_summary(member.enrolled_at, Utc::now(), &records, monthly_fee);

    Ok(Json(MemberDetailResponse {
        member: member.into(),
        summary,
    }))
}

/// Update a member's name or phone
#[utoipa::path(
    patch,
    path = "/admin/api/v1/members/{id}",
    request_body = MemberUpdate,
    tag = "members",
    params(
        ("id" = String, Path, format = "uuid", description = "Member id"),
    ),
    responses(
        (status = 200, description = "Updated member", body = MemberResponse),
        (status = 404, description = "No such member"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(member_id = %id))]
pub async fn update_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<MemberId>,
    Json(request): Json<MemberUpdate>,
) -> Result<Json<MemberResponse>, Error> {
    let update = MemberUpdateRequest {
        name: request.name,
        phone: request.phone,
    };
    let member = state.store.update_member(id, &update).await?;
    Ok(Json(member.into()))
}

/// Delete a member and all their dues records
#[utoipa::path(
    delete,
    path = "/admin/api/v1/members/{id}",
    tag = "members",
    params(
        ("id" = String, Path, format = "uuid", description = "Member id"),
    ),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "No such member"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(member_id = %id))]
pub async fn delete_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<MemberId>,
) -> Result<StatusCode, Error> {
    state.store.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List one member's dues records
#[utoipa::path(
    get,
    path = "/admin/api/v1/members/{id}/dues",
    tag = "members",
    params(
        ("id" = String, Path, format = "uuid", description = "Member id"),
    ),
    responses(
        (status = 200, description = "The member's dues records, newest first", body = Vec<DuesRecordResponse>),
        (status = 404, description = "No such member"),
    ),
    security(
        ("session_token" = [])
    )
)]
#[tracing::instrument(skip_all, fields(member_id = %id))]
pub async fn list_member_dues(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<MemberId>,
) -> Result<Json<Vec<DuesRecordResponse>>, Error> {
    if state.store.get_member(id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "member".to_string(),
            id: id.to_string(),
        });
    }

    let records = state
        .store
        .list_dues(&DuesFilter {
            member_id: Some(id),
            ..Default::default()
        })
        .await?;
    Ok(Json(records.into_iter().map(DuesRecordResponse::from).collect()))
}
