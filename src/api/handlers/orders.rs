use std::collections::{HashMap, HashSet};

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use tracing::info;

use crate::{
    AppState,
    api::models::orders::{OrderRequest, OrderResponse},
    errors::Error,
    gateway::{DUES_RECORD_IDS_NOTE, MEMBER_ID_NOTE, PaymentLinkRequest, new_receipt_id},
    store::models::DuesStatus,
};

/// Create a payment link for pending dues
///
/// Open to members without a session: the ids act as the capability, and the
/// money only ever moves toward the committee's account.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = OrderRequest,
    tag = "orders",
    responses(
        (status = 200, description = "Hosted checkout link", body = OrderResponse),
        (status = 400, description = "Empty batch, settled records, or mixed members"),
        (status = 404, description = "A referenced record does not exist"),
        (status = 502, description = "Payment provider rejected the request"),
    )
)]
#[tracing::instrument(skip_all, fields(records = request.dues_record_ids.len()))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> Result<Json<OrderResponse>, Error> {
    if request.dues_record_ids.is_empty() {
        return Err(Error::BadRequest {
            message: "duesRecordIds must not be empty".to_string(),
        });
    }

    let mut ids = request.dues_record_ids.clone();
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));

    let records = state.store.get_dues_records(&ids).await?;
    if records.len() != ids.len() {
        let found: HashSet<_> = records.iter().map(|record| record.id).collect();
        // At least one id is absent when the lengths differ
        let missing = ids
            .iter()
            .find(|id| !found.contains(id))
            .map(ToString::to_string)
            .unwrap_or_default();
        return Err(Error::NotFound {
            resource: "dues record".to_string(),
            id: missing,
        });
    }

    for record in &records {
        if record.status == DuesStatus::Paid {
            return Err(Error::BadRequest {
                message: format!(
                    "payment for {} {} has already been completed",
                    record.month, record.year
                ),
            });
        }
    }

    let member_ids: HashSet<_> = records.iter().map(|record| record.member_id).collect();
    if member_ids.len() > 1 {
        return Err(Error::BadRequest {
            message: "all records in one order must belong to the same member".to_string(),
        });
    }
    let member_id = records[0].member_id;
    let member = state
        .store
        .get_member(member_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "member".to_string(),
            id: member_id.to_string(),
        })?;

    let amount: Decimal = records.iter().map(|record| record.amount).sum();
    let periods: Vec<String> = records
        .iter()
        .map(|record| format!("{} {}", record.month, record.year))
        .collect();
    let description = if periods.len() > 1 {
        format!("Bundled membership dues for {}", periods.join(", "))
    } else {
        format!("Membership dues for {}", periods[0])
    };

    let notes = HashMap::from([
        (
            DUES_RECORD_IDS_NOTE.to_string(),
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        (MEMBER_ID_NOTE.to_string(), member_id.to_string()),
    ]);

    let link_request = PaymentLinkRequest {
        amount,
        description,
        reference_id: new_receipt_id(),
        customer_name: member.name,
        customer_email: member.email,
        customer_phone: member.phone,
        return_url: Some(request.return_url),
        notes,
    };

    let link = state.gateway.create_payment_link(&link_request).await?;
    info!(link_id = %link.id, %amount, "created payment link");

    Ok(Json(OrderResponse {
        short_url: link.short_url,
        payment_link_id: link.id,
        amount,
    }))
}
