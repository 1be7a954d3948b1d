//! Contract API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::contract::{Contract, ListContractsQuery, UpdateContractStatusRequest};
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::state::AppState;

/// GET /api/contracts - List the caller's contracts
pub async fn list_contracts(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListContractsQuery>,
) -> Result<Json<ApiResponse<Vec<Contract>>>, ApiError> {
    let contracts = app_state
        .contract_service
        .list_contracts(&user, query)
        .await?;

    Ok(Json(ApiResponse::ok(contracts)))
}

/// GET /api/contracts/:id - Get one contract
pub async fn get_contract(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Contract>>, ApiError> {
    let contract = app_state.contract_service.get_contract(&user, id).await?;

    Ok(Json(ApiResponse::ok(contract)))
}

/// POST /api/contracts/:id/status - Apply a single-step transition
pub async fn update_contract_status(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateContractStatusRequest>,
) -> Result<Json<ApiResponse<Contract>>, ApiError> {
    let (contract, events) = app_state
        .contract_service
        .update_status(&user, id, request)
        .await?;
    app_state.ws_state.publish_all(events);

    // Buyer-initiated updates are surfaced to the admin mailbox; delivery
    // must not hold up the response
    if contract.buyer_id == user.user_id {
        let mailer = app_state.mailer.clone();
        let snapshot = contract.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_contract_updated(&snapshot).await {
                tracing::error!(error = %e, "Failed to send contract update mail");
            }
        });
    }

    Ok(Json(ApiResponse::ok(contract)))
}
