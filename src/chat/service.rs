//! Chat service layer - conversations, messages, read tracking
//!
//! Message persistence and the matching broadcast happen in the same
//! request, so subscribers observe messages in commit order per
//! conversation.

use serde_json::json;
use sqlx::types::chrono::Utc;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::chat::model::{
    ChatMessage, Conversation, ConversationDetails, CreateConversationRequest, ListMessagesQuery,
    MessageKind, SendMessageRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::{UserRole, UserSummary};
use crate::websocket::{Channel, OutboundEvent};

/// Chat service for conversations and messages
pub struct ChatService {
    db: PgPool,
}

impl ChatService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Whether a user is a participant of the conversation.
    /// Used by the websocket layer to authorize channel subscriptions.
    pub async fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> ApiResult<bool> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM conversations WHERE id = $1 AND (seller_id = $2 OR buyer_id = $2)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(found > 0)
    }

    /// Open the direct conversation with a counterparty, reusing the
    /// existing thread for the pair if there is one.
    pub async fn open_direct(
        &self,
        actor: &AuthenticatedUser,
        request: CreateConversationRequest,
    ) -> ApiResult<(ConversationDetails, Vec<OutboundEvent>)> {
        request.validate()?;

        if request.counterparty_id == actor.user_id {
            return Err(ApiError::ValidationError(
                "Cannot open a conversation with yourself".to_string(),
            ));
        }

        let counterparty_role =
            sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
                .bind(request.counterparty_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| ApiError::NotFound("Counterparty not found".to_string()))?;

        // A direct thread always pairs one seller with one buyer.
        let (seller_id, buyer_id) = match (actor.role, counterparty_role) {
            (UserRole::Seller, UserRole::Buyer) => (actor.user_id, request.counterparty_id),
            (UserRole::Buyer, UserRole::Seller) => (request.counterparty_id, actor.user_id),
            _ => {
                return Err(ApiError::ValidationError(
                    "A conversation pairs a buyer with a seller".to_string(),
                ))
            }
        };

        if let Some(existing) = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE seller_id = $1 AND buyer_id = $2 AND kind = 'direct'",
        )
        .bind(seller_id)
        .bind(buyer_id)
        .fetch_optional(&self.db)
        .await?
        {
            let details = self.with_participants(existing).await?;
            return Ok((details, Vec::new()));
        }

        let participants = self.load_summaries(&[seller_id, buyer_id]).await?;
        let seller = participants
            .get(&seller_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Seller not found".to_string()))?;
        let buyer = participants
            .get(&buyer_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Buyer not found".to_string()))?;

        let title = request
            .title
            .unwrap_or_else(|| format!("{} / {}", buyer.display_name, seller.display_name));

        let inserted = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (
                id, kind, title, seller_id, buyer_id, last_activity_at,
                is_active, created_at, updated_at
            )
            VALUES ($1, 'direct', $2, $3, $4, $5, TRUE, $5, $5)
            ON CONFLICT (seller_id, buyer_id) WHERE kind = 'direct' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&title)
        .bind(seller_id)
        .bind(buyer_id)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        let conversation = match inserted {
            Some(conversation) => conversation,
            // Lost the creation race; the winner's row is authoritative
            None => {
                sqlx::query_as::<_, Conversation>(
                    "SELECT * FROM conversations WHERE seller_id = $1 AND buyer_id = $2 AND kind = 'direct'",
                )
                .bind(seller_id)
                .bind(buyer_id)
                .fetch_one(&self.db)
                .await?
            }
        };

        tracing::info!(conversation_id = %conversation.id, "Conversation opened");

        let details = ConversationDetails {
            conversation,
            seller,
            buyer,
        };

        let events = conversation_created_events(&details);
        Ok((details, events))
    }

    /// Get one conversation with participant display fields
    pub async fn get_conversation(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> ApiResult<ConversationDetails> {
        let conversation = self.load_for_participant(actor, id).await?;
        self.with_participants(conversation).await
    }

    /// List the caller's conversations, most recently active first
    pub async fn list_conversations(
        &self,
        actor: &AuthenticatedUser,
        page: Option<i32>,
        limit: Option<i32>,
    ) -> ApiResult<Vec<ConversationDetails>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE seller_id = $1 OR buyer_id = $1
            ORDER BY last_activity_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(actor.user_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.db)
        .await?;

        let mut user_ids: Vec<Uuid> = Vec::new();
        for conversation in &conversations {
            user_ids.push(conversation.seller_id);
            user_ids.push(conversation.buyer_id);
        }
        let summaries = self.load_summaries(&user_ids).await?;

        let mut details = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let seller = summaries
                .get(&conversation.seller_id)
                .cloned()
                .ok_or_else(|| ApiError::InternalError("Missing participant row".to_string()))?;
            let buyer = summaries
                .get(&conversation.buyer_id)
                .cloned()
                .ok_or_else(|| ApiError::InternalError("Missing participant row".to_string()))?;
            details.push(ConversationDetails {
                conversation,
                seller,
                buyer,
            });
        }

        Ok(details)
    }

    /// Send a message into a conversation the caller participates in
    pub async fn send_message(
        &self,
        actor: &AuthenticatedUser,
        conversation_id: Uuid,
        request: SendMessageRequest,
    ) -> ApiResult<(ChatMessage, Vec<OutboundEvent>)> {
        request.validate()?;

        let conversation = self.load_for_participant(actor, conversation_id).await?;

        if !conversation.is_active {
            return Err(ApiError::ValidationError(
                "Conversation is no longer active".to_string(),
            ));
        }

        let kind = request.kind.unwrap_or(MessageKind::Text);

        let mut tx = self.db.begin().await?;
        let message = insert_message_tx(
            &mut tx,
            &conversation,
            actor.user_id,
            &request.content,
            kind,
        )
        .await?;
        tx.commit().await?;

        let events = message_sent_events(&conversation, &message);
        Ok((message, events))
    }

    /// Mark a message read. Only the receiving participant may do this;
    /// repeating the call is a no-op.
    pub async fn mark_read(
        &self,
        actor: &AuthenticatedUser,
        message_id: Uuid,
    ) -> ApiResult<(ChatMessage, Vec<OutboundEvent>)> {
        let message =
            sqlx::query_as::<_, ChatMessage>("SELECT * FROM messages WHERE id = $1")
                .bind(message_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Message {} not found", message_id)))?;

        let conversation = self
            .load_for_participant(actor, message.conversation_id)
            .await?;

        if message.sender_id == actor.user_id {
            return Err(ApiError::Forbidden(
                "Only the recipient may mark a message read".to_string(),
            ));
        }

        if message.is_read {
            return Ok((message, Vec::new()));
        }

        let updated = sqlx::query_as::<_, ChatMessage>(
            "UPDATE messages SET is_read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(message_id)
        .fetch_one(&self.db)
        .await?;

        let events = vec![OutboundEvent::new(
            Channel::Conversation(conversation.id),
            "message.read",
            json!({
                "message_id": updated.id,
                "conversation_id": conversation.id,
                "reader_id": actor.user_id,
            }),
        )];

        Ok((updated, events))
    }

    /// List messages in a conversation, newest first
    pub async fn list_messages(
        &self,
        actor: &AuthenticatedUser,
        conversation_id: Uuid,
        query: ListMessagesQuery,
    ) -> ApiResult<Vec<ChatMessage>> {
        self.load_for_participant(actor, conversation_id).await?;

        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = (page - 1) * limit;

        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.db)
        .await?;

        Ok(messages)
    }

    // ===== Helpers =====

    async fn load_for_participant(
        &self,
        actor: &AuthenticatedUser,
        conversation_id: Uuid,
    ) -> ApiResult<Conversation> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Conversation {} not found", conversation_id))
                })?;

        if !conversation.has_participant(actor.user_id) {
            return Err(ApiError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }

        Ok(conversation)
    }

    async fn with_participants(&self, conversation: Conversation) -> ApiResult<ConversationDetails> {
        let summaries = self
            .load_summaries(&[conversation.seller_id, conversation.buyer_id])
            .await?;
        let seller = summaries
            .get(&conversation.seller_id)
            .cloned()
            .ok_or_else(|| ApiError::InternalError("Missing participant row".to_string()))?;
        let buyer = summaries
            .get(&conversation.buyer_id)
            .cloned()
            .ok_or_else(|| ApiError::InternalError("Missing participant row".to_string()))?;

        Ok(ConversationDetails {
            conversation,
            seller,
            buyer,
        })
    }

    async fn load_summaries(&self, ids: &[Uuid]) -> ApiResult<HashMap<Uuid, UserSummary>> {
        let rows = sqlx::query_as::<_, UserSummary>(
            "SELECT id, display_name, avatar_url FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|u| (u.id, u)).collect())
    }
}

/// Insert a message and bump the conversation's last-message tracking
/// inside the caller's transaction. Shared with the quote and contract
/// services, which post system messages as transition side effects.
pub(crate) async fn insert_message_tx(
    conn: &mut PgConnection,
    conversation: &Conversation,
    sender_id: Uuid,
    content: &str,
    kind: MessageKind,
) -> ApiResult<ChatMessage> {
    let now = Utc::now();

    let message = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO messages (
            id, conversation_id, sender_id, content, kind, is_read,
            sent_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, FALSE, $6, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(conversation.id)
    .bind(sender_id)
    .bind(content)
    .bind(kind)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE conversations
        SET last_message_id = $1, last_activity_at = $2, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(message.id)
    .bind(now)
    .bind(conversation.id)
    .execute(&mut *conn)
    .await?;

    Ok(message)
}

/// Create a contract conversation inside the caller's transaction
pub(crate) async fn create_contract_conversation_tx(
    conn: &mut PgConnection,
    seller_id: Uuid,
    buyer_id: Uuid,
    title: &str,
) -> ApiResult<Conversation> {
    let conversation = sqlx::query_as::<_, Conversation>(
        r#"
        INSERT INTO conversations (
            id, kind, title, seller_id, buyer_id, last_activity_at,
            is_active, created_at, updated_at
        )
        VALUES ($1, 'contract', $2, $3, $4, $5, TRUE, $5, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(seller_id)
    .bind(buyer_id)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(conversation)
}

/// Events announcing a new conversation; the payload carries the
/// participants' display fields so subscribers need no follow-up fetch
pub(crate) fn conversation_created_events(details: &ConversationDetails) -> Vec<OutboundEvent> {
    let payload = json!({
        "conversation_id": details.conversation.id,
        "kind": details.conversation.kind,
        "title": details.conversation.title,
        "seller_id": details.seller.id,
        "seller_name": details.seller.display_name,
        "seller_avatar": details.seller.avatar_url,
        "buyer_id": details.buyer.id,
        "buyer_name": details.buyer.display_name,
        "buyer_avatar": details.buyer.avatar_url,
    });

    vec![
        OutboundEvent::new(
            Channel::UserNotifications(details.conversation.seller_id),
            "conversation.created",
            payload.clone(),
        ),
        OutboundEvent::new(
            Channel::UserNotifications(details.conversation.buyer_id),
            "conversation.created",
            payload,
        ),
    ]
}

/// Events for a freshly persisted message: the conversation stream plus
/// a notification ping for the counterparty
pub(crate) fn message_sent_events(
    conversation: &Conversation,
    message: &ChatMessage,
) -> Vec<OutboundEvent> {
    let payload = json!({
        "message_id": message.id,
        "conversation_id": conversation.id,
        "sender_id": message.sender_id,
        "content": message.content,
        "kind": message.kind,
        "sent_at": message.sent_at,
    });

    vec![
        OutboundEvent::new(
            Channel::Conversation(conversation.id),
            "message.sent",
            payload.clone(),
        ),
        OutboundEvent::new(
            Channel::UserNotifications(conversation.counterparty(message.sender_id)),
            "message.sent",
            payload,
        ),
    ]
}
