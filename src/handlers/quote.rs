//! Quote API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::contract::Contract;
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::quote::{
    AcceptQuoteRequest, CreateQuoteRequest, ListQuotesQuery, Quote, QuoteWithItems,
    UpdateQuoteRequest,
};
use crate::state::AppState;

/// POST /api/quotes - Seller quotes an RFQ or a conversation
pub async fn create_quote(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<Json<ApiResponse<QuoteWithItems>>, ApiError> {
    let (quote, events) = app_state.quote_service.create_quote(&user, request).await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(quote)))
}

/// GET /api/quotes - List the caller's quotes
pub async fn list_quotes(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuotesQuery>,
) -> Result<Json<ApiResponse<Vec<QuoteWithItems>>>, ApiError> {
    let quotes = app_state.quote_service.list_quotes(&user, query).await?;

    Ok(Json(ApiResponse::ok(quotes)))
}

/// GET /api/quotes/:id - Get one quote with its items
pub async fn get_quote(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<QuoteWithItems>>, ApiError> {
    let quote = app_state.quote_service.get_quote(&user, id).await?;

    Ok(Json(ApiResponse::ok(quote)))
}

/// PUT /api/quotes/:id - Seller updates items pre-accept
pub async fn update_quote(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateQuoteRequest>,
) -> Result<Json<ApiResponse<QuoteWithItems>>, ApiError> {
    let (quote, events) = app_state
        .quote_service
        .update_quote(&user, id, request)
        .await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(quote)))
}

/// POST /api/quotes/:id/accept - Buyer accepts; creates the contract
pub async fn accept_quote(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AcceptQuoteRequest>,
) -> Result<Json<ApiResponse<Contract>>, ApiError> {
    let (contract, events) = app_state
        .quote_service
        .accept_quote(&user, id, request)
        .await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(contract)))
}

/// POST /api/quotes/:id/reject - Buyer rejects the quote
pub async fn reject_quote(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Quote>>, ApiError> {
    let (quote, events) = app_state.quote_service.reject_quote(&user, id).await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(quote)))
}
