//! Chat API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::chat::{
    ChatMessage, ConversationDetails, CreateConversationRequest, ListMessagesQuery,
    SendMessageRequest,
};
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

/// POST /api/conversations - Open (or reuse) the direct thread with a counterparty
pub async fn open_conversation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<ApiResponse<ConversationDetails>>, ApiError> {
    let (conversation, events) = app_state.chat_service.open_direct(&user, request).await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(conversation)))
}

/// GET /api/conversations - List the caller's conversations
pub async fn list_conversations(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<ApiResponse<Vec<ConversationDetails>>>, ApiError> {
    let conversations = app_state
        .chat_service
        .list_conversations(&user, query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::ok(conversations)))
}

/// GET /api/conversations/:id - Get one conversation
pub async fn get_conversation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ConversationDetails>>, ApiError> {
    let conversation = app_state.chat_service.get_conversation(&user, id).await?;

    Ok(Json(ApiResponse::ok(conversation)))
}

/// GET /api/conversations/:id/messages - List messages, newest first
pub async fn list_messages(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, ApiError> {
    let messages = app_state
        .chat_service
        .list_messages(&user, id, query)
        .await?;

    Ok(Json(ApiResponse::ok(messages)))
}

/// POST /api/conversations/:id/messages - Send a message
pub async fn send_message(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<ChatMessage>>, ApiError> {
    let (message, events) = app_state
        .chat_service
        .send_message(&user, id, request)
        .await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(message)))
}

/// POST /api/messages/:id/read - Recipient marks a message read
pub async fn mark_message_read(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ChatMessage>>, ApiError> {
    let (message, events) = app_state.chat_service.mark_read(&user, id).await?;
    app_state.ws_state.publish_all(events);

    Ok(Json(ApiResponse::ok(message)))
}
