//! Conversation and message models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::UserSummary;

/// Two-party conversation
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub title: String,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub last_message_id: Option<Uuid>,
    pub last_activity_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether a user is one of the two participants
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.seller_id == user_id || self.buyer_id == user_id
    }

    /// The participant who is not `user_id`
    pub fn counterparty(&self, user_id: Uuid) -> Uuid {
        if self.seller_id == user_id {
            self.buyer_id
        } else {
            self.seller_id
        }
    }
}

/// Conversation kinds
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "conversation_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Contract,
}

/// Chat message
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Message content kinds
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
    Rfq,
    Quote,
    Contract,
}

/// Conversation enriched with participant display fields, used both for
/// API responses and the `conversation.created` broadcast payload
#[derive(Debug, Serialize, Clone)]
pub struct ConversationDetails {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub seller: UserSummary,
    pub buyer: UserSummary,
}

/// Request DTO for opening (or reusing) a direct conversation
#[derive(Debug, Deserialize, Validate)]
pub struct CreateConversationRequest {
    pub counterparty_id: Uuid,
    #[validate(length(min = 1, max = 256))]
    pub title: Option<String>,
}

/// Request DTO for sending a message
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 8192))]
    pub content: String,
    pub kind: Option<MessageKind>,
}

/// Query parameters for listing messages
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(seller: Uuid, buyer: Uuid) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Direct,
            title: "Acme / Bolt".to_string(),
            seller_id: seller,
            buyer_id: buyer,
            last_message_id: None,
            last_activity_at: Utc::now(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_participants() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let convo = conversation(seller, buyer);

        assert!(convo.has_participant(seller));
        assert!(convo.has_participant(buyer));
        assert!(!convo.has_participant(Uuid::new_v4()));

        assert_eq!(convo.counterparty(seller), buyer);
        assert_eq!(convo.counterparty(buyer), seller);
    }

    #[test]
    fn test_send_message_validation() {
        let req = SendMessageRequest {
            content: String::new(),
            kind: None,
        };
        assert!(validator::Validate::validate(&req).is_err());

        let req = SendMessageRequest {
            content: "hello".to_string(),
            kind: Some(MessageKind::Text),
        };
        assert!(validator::Validate::validate(&req).is_ok());
    }
}
