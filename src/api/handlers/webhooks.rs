use std::collections::HashSet;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    AppState,
    errors::Error,
    gateway::WebhookEvent,
    store::{
        StoreError,
        models::{DuesStatus, PaymentMethod, Settlement},
    },
    types::DuesRecordId,
};

/// Receive a payment event from the gateway
///
/// The raw body is verified against the signature header before anything is
/// parsed. Once the delivery is authentic, data problems (unknown ids,
/// replays, unparseable payloads) are logged and acknowledged with 200 so the
/// gateway stops retrying them; only storage failures return 5xx, because a
/// retry can still succeed there and settlement is idempotent.
#[utoipa::path(
    post,
    path = "/webhooks/payment",
    tag = "webhooks",
    request_body = String,
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Signature header missing"),
        (status = 403, description = "Signature verification failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, Error> {
    state.gateway.verify_webhook(&headers, &body)?;

    let event: WebhookEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(error) => {
            warn!(%error, "verified webhook carried an unparseable payload");
            return Ok(StatusCode::OK);
        }
    };

    let Some(notice) = event.into_notice() else {
        debug!("ignoring webhook event kind with no settlement work");
        return Ok(StatusCode::OK);
    };

    if notice.dues_record_ids.is_empty() {
        warn!(
            payment_id = %notice.gateway_payment_id,
            "paid event carried no dues record ids in its notes"
        );
        return Ok(StatusCode::OK);
    }

    let mut ids: Vec<DuesRecordId> = Vec::new();
    for raw in &notice.dues_record_ids {
        match raw.parse::<DuesRecordId>() {
            Ok(id) => ids.push(id),
            Err(_) => warn!(id = %raw, "dropping unparseable dues record id from webhook notes"),
        }
    }
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(*id));

    let records = state.store.get_dues_records(&ids).await?;
    let found: HashSet<_> = records.iter().map(|record| record.id).collect();
    for id in &ids {
        if !found.contains(id) {
            warn!(record_id = %id, "webhook referenced an unknown dues record; dropping it from the batch");
        }
    }

    let mut to_settle = Vec::new();
    for record in &records {
        if record.status == DuesStatus::Paid {
            info!(record_id = %record.id, "webhook replay for an already settled record; skipping");
        } else {
            to_settle.push(record.id);
        }
    }

    if to_settle.is_empty() {
        return Ok(StatusCode::OK);
    }

    let settlement = Settlement {
        method: PaymentMethod::Online,
        paid_at: notice.paid_at.unwrap_or_else(Utc::now),
        receipt_id: None,
        gateway_payment_id: Some(notice.gateway_payment_id.clone()),
    };

    match state.store.settle_dues_batch(&to_settle, &settlement).await {
        Ok(settled) => {
            info!(
                count = settled.len(),
                payment_id = %notice.gateway_payment_id,
                "settled dues records from webhook"
            );
            Ok(StatusCode::OK)
        }
        // A racing delivery got there first; the money is recorded either way
        Err(StoreError::AlreadySettled { .. }) | Err(StoreError::NotFound { .. }) => {
            info!(
                payment_id = %notice.gateway_payment_id,
                "webhook batch was settled or removed concurrently"
            );
            Ok(StatusCode::OK)
        }
        Err(error) => Err(error.into()),
    }
}
