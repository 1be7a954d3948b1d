//! RFQ models and lifecycle transition table

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;

/// Request for quotation
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Rfq {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub initial_product_id: Uuid,
    pub initial_quantity: i32,
    pub shipping_country: String,
    pub shipping_address: String,
    pub buyer_message: Option<String>,
    pub status: RfqStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// RFQ lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "rfq_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    Pending,
    Seen,
    InProgress,
    Quoted,
    Rejected,
    Closed,
}

impl RfqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfqStatus::Pending => "pending",
            RfqStatus::Seen => "seen",
            RfqStatus::InProgress => "in_progress",
            RfqStatus::Quoted => "quoted",
            RfqStatus::Rejected => "rejected",
            RfqStatus::Closed => "closed",
        }
    }
}

/// Actions that drive the RFQ lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfqAction {
    /// Seller opened the RFQ
    MarkSeen,
    /// Seller started working the RFQ
    MarkInProgress,
    /// A quote referencing this RFQ was created
    RecordQuote,
    /// Seller declined the RFQ
    Reject,
    /// Administrative close
    Close,
}

impl RfqAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfqAction::MarkSeen => "mark_seen",
            RfqAction::MarkInProgress => "mark_in_progress",
            RfqAction::RecordQuote => "record_quote",
            RfqAction::Reject => "reject",
            RfqAction::Close => "close",
        }
    }
}

/// Outcome of applying an action to a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfqTransition {
    /// Status changes to the contained value
    Applied(RfqStatus),
    /// Action is a valid repeat; status stays put
    Noop,
}

/// Requested action is not reachable from the current status
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot {action} an RFQ in status '{status}'")]
pub struct RfqTransitionError {
    pub status: &'static str,
    pub action: &'static str,
}

impl From<RfqTransitionError> for ApiError {
    fn from(err: RfqTransitionError) -> Self {
        ApiError::InvalidTransition(err.to_string())
    }
}

/// The single authoritative transition table for RFQs.
///
/// `MarkSeen`/`MarkInProgress` are idempotent: repeating them at or past
/// the target state is a no-op, but `quoted`, `rejected`, and `closed`
/// refuse them. `RecordQuote` is a no-op on an already-quoted RFQ so a
/// seller can send follow-up quotes. `Close` succeeds from any state.
pub fn transition(
    current: RfqStatus,
    action: RfqAction,
) -> Result<RfqTransition, RfqTransitionError> {
    use RfqStatus::*;
    use RfqTransition::*;

    let invalid = || {
        Err(RfqTransitionError {
            status: current.as_str(),
            action: action.as_str(),
        })
    };

    match action {
        RfqAction::MarkSeen => match current {
            Pending => Ok(Applied(Seen)),
            Seen | InProgress => Ok(Noop),
            Quoted | Rejected | Closed => invalid(),
        },
        RfqAction::MarkInProgress => match current {
            Pending | Seen => Ok(Applied(InProgress)),
            InProgress => Ok(Noop),
            Quoted | Rejected | Closed => invalid(),
        },
        RfqAction::RecordQuote => match current {
            Pending | Seen | InProgress => Ok(Applied(Quoted)),
            Quoted => Ok(Noop),
            Rejected | Closed => invalid(),
        },
        RfqAction::Reject => match current {
            Pending | Seen | InProgress => Ok(Applied(Rejected)),
            Quoted | Rejected | Closed => invalid(),
        },
        RfqAction::Close => match current {
            Closed => Ok(Noop),
            _ => Ok(Applied(Closed)),
        },
    }
}

/// Request DTO for creating an RFQ
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRfqRequest {
    pub seller_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 2, max = 64))]
    pub shipping_country: String,
    #[validate(length(min = 1, max = 1024))]
    pub shipping_address: String,
    #[validate(length(max = 4096))]
    pub message: Option<String>,
}

/// Query parameters for listing RFQs
#[derive(Debug, Deserialize)]
pub struct ListRfqsQuery {
    pub status: Option<RfqStatus>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use RfqAction::*;
    use RfqStatus::*;
    use RfqTransition::*;

    #[test]
    fn test_mark_seen() {
        assert_eq!(transition(Pending, MarkSeen), Ok(Applied(Seen)));
        assert_eq!(transition(Seen, MarkSeen), Ok(Noop));
        assert_eq!(transition(InProgress, MarkSeen), Ok(Noop));
        assert!(transition(Quoted, MarkSeen).is_err());
        assert!(transition(Rejected, MarkSeen).is_err());
        assert!(transition(Closed, MarkSeen).is_err());
    }

    #[test]
    fn test_mark_in_progress() {
        assert_eq!(transition(Pending, MarkInProgress), Ok(Applied(InProgress)));
        assert_eq!(transition(Seen, MarkInProgress), Ok(Applied(InProgress)));
        assert_eq!(transition(InProgress, MarkInProgress), Ok(Noop));
        assert!(transition(Quoted, MarkInProgress).is_err());
        assert!(transition(Rejected, MarkInProgress).is_err());
        assert!(transition(Closed, MarkInProgress).is_err());
    }

    #[test]
    fn test_record_quote() {
        assert_eq!(transition(Pending, RecordQuote), Ok(Applied(Quoted)));
        assert_eq!(transition(Seen, RecordQuote), Ok(Applied(Quoted)));
        assert_eq!(transition(InProgress, RecordQuote), Ok(Applied(Quoted)));
        // Quoted RFQs may receive further quotes
        assert_eq!(transition(Quoted, RecordQuote), Ok(Noop));
        assert!(transition(Rejected, RecordQuote).is_err());
        assert!(transition(Closed, RecordQuote).is_err());
    }

    #[test]
    fn test_reject() {
        assert_eq!(transition(Pending, Reject), Ok(Applied(Rejected)));
        assert_eq!(transition(Seen, Reject), Ok(Applied(Rejected)));
        assert_eq!(transition(InProgress, Reject), Ok(Applied(Rejected)));
        // Once quoted, the quote drives the outcome
        assert!(transition(Quoted, Reject).is_err());
        assert!(transition(Rejected, Reject).is_err());
        assert!(transition(Closed, Reject).is_err());
    }

    #[test]
    fn test_close_from_any_state() {
        for status in [Pending, Seen, InProgress, Quoted, Rejected] {
            assert_eq!(transition(status, Close), Ok(Applied(Closed)));
        }
        assert_eq!(transition(Closed, Close), Ok(Noop));
    }

    #[test]
    fn test_transition_error_message() {
        let err = transition(Rejected, MarkSeen).unwrap_err();
        assert_eq!(err.status, "rejected");
        assert_eq!(err.action, "mark_seen");
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn test_create_request_validation() {
        let req = CreateRfqRequest {
            seller_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 0,
            shipping_country: "DE".to_string(),
            shipping_address: "Musterstr. 1, Berlin".to_string(),
            message: None,
        };
        assert!(req.validate().is_err());

        let req = CreateRfqRequest { quantity: 10, ..req };
        assert!(req.validate().is_ok());
    }
}
