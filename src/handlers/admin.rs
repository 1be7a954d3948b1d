//! Admin moderation handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::contract::{BulkItemOutcome, BulkUpdateStatusRequest};
use crate::error::ApiError;
use crate::middleware::AdminUser;
use crate::models::ApiResponse;
use crate::rfq::Rfq;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub results: Vec<BulkItemOutcome>,
}

/// POST /api/admin/contracts/status - Bulk single-step transition.
/// Failures are reported per contract, not rolled back as a group.
pub async fn bulk_update_contract_status(
    State(app_state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(request): Json<BulkUpdateStatusRequest>,
) -> Result<Json<ApiResponse<BulkUpdateResponse>>, ApiError> {
    let (results, events) = app_state
        .contract_service
        .bulk_update_status(&user, request)
        .await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(BulkUpdateResponse { results })))
}

/// POST /api/admin/rfqs/:id/close - Administrative close, valid from any state
pub async fn close_rfq(
    State(app_state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Rfq>>, ApiError> {
    let (rfq, events) = app_state.rfq_service.admin_close(&user, id).await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(rfq)))
}
