//! API request/response models for members.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::dues::DuesRecordResponse;
use crate::billing::DueSummary;
use crate::store::models::{Member, MemberRole};
use crate::types::MemberId;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberCreate {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub role: MemberRole,
    /// When the member joined; defaults to now. Drives the due calculation
    /// and cannot be changed later.
    pub enrolled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: MemberRole,
    pub enrolled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            name: member.name,
            email: member.email,
            phone: member.phone,
            role: member.role,
            enrolled_at: member.enrolled_at,
            created_at: member.created_at,
            updated_at: member.updated_at,
        }
    }
}

/// Enrollment result: the new member plus the opening dues record seeded for
/// the current period (absent for admins, who are never billed).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    pub member: MemberResponse,
    pub initial_dues: Option<DuesRecordResponse>,
}

/// One member with the calculated state of their account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberDetailResponse {
    pub member: MemberResponse,
    pub summary: DueSummary,
}
