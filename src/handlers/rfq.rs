//! RFQ API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::rfq::{CreateRfqRequest, ListRfqsQuery, Rfq, RfqAction};
use crate::state::AppState;

/// POST /api/rfqs - Buyer creates an RFQ against a seller's product
pub async fn create_rfq(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateRfqRequest>,
) -> Result<Json<ApiResponse<Rfq>>, ApiError> {
    let (rfq, events) = app_state.rfq_service.create_rfq(&user, request).await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(rfq)))
}

/// GET /api/rfqs - List the caller's RFQs
pub async fn list_rfqs(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListRfqsQuery>,
) -> Result<Json<ApiResponse<Vec<Rfq>>>, ApiError> {
    let rfqs = app_state.rfq_service.list_rfqs(&user, query).await?;

    Ok(Json(ApiResponse::ok(rfqs)))
}

/// GET /api/rfqs/:id - Get one RFQ
pub async fn get_rfq(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Rfq>>, ApiError> {
    let rfq = app_state.rfq_service.get_rfq(&user, id).await?;

    Ok(Json(ApiResponse::ok(rfq)))
}

/// POST /api/rfqs/:id/seen - Seller marks the RFQ seen
pub async fn mark_rfq_seen(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Rfq>>, ApiError> {
    let (rfq, events) = app_state
        .rfq_service
        .apply_seller_action(&user, id, RfqAction::MarkSeen)
        .await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(rfq)))
}

/// POST /api/rfqs/:id/in-progress - Seller marks the RFQ in progress
pub async fn mark_rfq_in_progress(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Rfq>>, ApiError> {
    let (rfq, events) = app_state
        .rfq_service
        .apply_seller_action(&user, id, RfqAction::MarkInProgress)
        .await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(rfq)))
}

/// POST /api/rfqs/:id/reject - Seller declines the RFQ
pub async fn reject_rfq(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Rfq>>, ApiError> {
    let (rfq, events) = app_state
        .rfq_service
        .apply_seller_action(&user, id, RfqAction::Reject)
        .await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(rfq)))
}
