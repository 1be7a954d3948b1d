//! Contract models and status transition table

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

/// Binding agreement created from an accepted quote
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Contract {
    pub id: Uuid,
    pub contract_number: String,
    pub quote_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub total_amount_cents: i64,
    pub currency: String,
    pub status: ContractStatus,
    pub seller_transaction_id: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub shipping_address: String,
    pub billing_address: String,
    pub terms_and_conditions: String,
    pub metadata: serde_json::Value,
    pub conversation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contract lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "contract_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    PendingApproval,
    Approved,
    PendingPayment,
    PendingPaymentConfirmation,
    BuyerPaymentRejected,
    InProgress,
    VerifyShipmentUrl,
    Shipped,
    Delivered,
    DeliveredAndPaid,
    Completed,
    Cancelled,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::PendingApproval => "pending_approval",
            ContractStatus::Approved => "approved",
            ContractStatus::PendingPayment => "pending_payment",
            ContractStatus::PendingPaymentConfirmation => "pending_payment_confirmation",
            ContractStatus::BuyerPaymentRejected => "buyer_payment_rejected",
            ContractStatus::InProgress => "in_progress",
            ContractStatus::VerifyShipmentUrl => "verify_shipment_url",
            ContractStatus::Shipped => "shipped",
            ContractStatus::Delivered => "delivered",
            ContractStatus::DeliveredAndPaid => "delivered_and_paid",
            ContractStatus::Completed => "completed",
            ContractStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Completed | ContractStatus::Cancelled)
    }

    /// Forward successors of a status. `cancelled` is handled separately
    /// as the universal escape from any non-terminal state.
    pub fn successors(&self) -> &'static [ContractStatus] {
        use ContractStatus::*;
        match self {
            PendingApproval => &[Approved],
            Approved => &[PendingPayment],
            PendingPayment => &[PendingPaymentConfirmation],
            PendingPaymentConfirmation => &[InProgress, BuyerPaymentRejected],
            BuyerPaymentRejected => &[PendingPayment],
            InProgress => &[VerifyShipmentUrl],
            VerifyShipmentUrl => &[Shipped],
            Shipped => &[Delivered],
            Delivered => &[DeliveredAndPaid],
            DeliveredAndPaid => &[Completed],
            Completed | Cancelled => &[],
        }
    }
}

/// Requested status is not reachable from the current status
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot move a contract from '{from}' to '{to}'")]
pub struct ContractTransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

impl From<ContractTransitionError> for ApiError {
    fn from(err: ContractTransitionError) -> Self {
        ApiError::InvalidTransition(err.to_string())
    }
}

/// Validate a single-step transition. No state skipping; the only
/// universal edge is into `cancelled` from any non-terminal state.
pub fn transition(
    current: ContractStatus,
    requested: ContractStatus,
) -> Result<(), ContractTransitionError> {
    if requested == ContractStatus::Cancelled && !current.is_terminal() {
        return Ok(());
    }

    if current.successors().contains(&requested) {
        return Ok(());
    }

    Err(ContractTransitionError {
        from: current.as_str(),
        to: requested.as_str(),
    })
}

/// Seller transaction ids are 10-25 uppercase alphanumeric characters
pub fn is_valid_transaction_id(id: &str) -> bool {
    (10..=25).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Generate a contract number: `CT-<YYYYMMDD>-<6 uppercase alnum>`
pub fn generate_contract_number(now: DateTime<Utc>) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("CT-{}-{}", now.format("%Y%m%d"), suffix)
}

/// Fields needed to create a contract from an accepted quote
#[derive(Debug)]
pub struct NewContract {
    pub quote_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub total_amount_cents: i64,
    pub currency: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub terms_and_conditions: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// Request DTO for a status transition
#[derive(Debug, Deserialize)]
pub struct UpdateContractStatusRequest {
    pub status: ContractStatus,
    pub seller_transaction_id: Option<String>,
}

/// Request DTO for the admin bulk transition
#[derive(Debug, Deserialize)]
pub struct BulkUpdateStatusRequest {
    pub contract_ids: Vec<Uuid>,
    pub status: ContractStatus,
}

/// Per-contract outcome of a bulk transition; failures are isolated
#[derive(Debug, Serialize)]
pub struct BulkItemOutcome {
    pub contract_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Query parameters for listing contracts
#[derive(Debug, Deserialize)]
pub struct ListContractsQuery {
    pub status: Option<ContractStatus>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContractStatus::*;

    #[test]
    fn test_happy_path_chain() {
        let chain = [
            PendingApproval,
            Approved,
            PendingPayment,
            PendingPaymentConfirmation,
            InProgress,
            VerifyShipmentUrl,
            Shipped,
            Delivered,
            DeliveredAndPaid,
            Completed,
        ];

        for pair in chain.windows(2) {
            assert_eq!(
                transition(pair[0], pair[1]),
                Ok(()),
                "{} -> {}",
                pair[0].as_str(),
                pair[1].as_str()
            );
        }
    }

    #[test]
    fn test_payment_rejection_and_retry() {
        assert_eq!(
            transition(PendingPaymentConfirmation, BuyerPaymentRejected),
            Ok(())
        );
        assert_eq!(transition(BuyerPaymentRejected, PendingPayment), Ok(()));
    }

    #[test]
    fn test_no_state_skipping() {
        assert!(transition(PendingApproval, PendingPayment).is_err());
        assert!(transition(Approved, InProgress).is_err());
        assert!(transition(InProgress, Shipped).is_err());
        assert!(transition(Delivered, Completed).is_err());
    }

    #[test]
    fn test_no_backward_moves() {
        assert!(transition(Approved, PendingApproval).is_err());
        assert!(transition(Shipped, InProgress).is_err());
    }

    #[test]
    fn test_cancel_from_any_non_terminal() {
        for status in [
            PendingApproval,
            Approved,
            PendingPayment,
            PendingPaymentConfirmation,
            BuyerPaymentRejected,
            InProgress,
            VerifyShipmentUrl,
            Shipped,
            Delivered,
            DeliveredAndPaid,
        ] {
            assert_eq!(transition(status, Cancelled), Ok(()), "{}", status.as_str());
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for status in [Completed, Cancelled] {
            assert!(transition(status, Cancelled).is_err());
            assert!(transition(status, PendingApproval).is_err());
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn test_transaction_id_validation() {
        assert!(is_valid_transaction_id("ABC1234567"));
        assert!(is_valid_transaction_id("A1B2C3D4E5F6G7H8I9J0K1L2M"));

        // Too short, lowercase, bad characters, too long
        assert!(!is_valid_transaction_id("abc123"));
        assert!(!is_valid_transaction_id("ABC123456"));
        assert!(!is_valid_transaction_id("abc1234567"));
        assert!(!is_valid_transaction_id("ABC-1234567"));
        assert!(!is_valid_transaction_id("A1B2C3D4E5F6G7H8I9J0K1L2M6"));
        assert!(!is_valid_transaction_id(""));
    }

    #[test]
    fn test_contract_number_format() {
        let number = generate_contract_number(Utc::now());
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CT");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
