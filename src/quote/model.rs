//! Quote models, item arithmetic, and request DTOs

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// Seller's priced response to an RFQ or chat inquiry
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Quote {
    pub id: Uuid,
    pub rfq_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quote lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "quote_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Sent,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuoteStatus::Sent)
    }
}

/// One priced line of a quote
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct QuoteItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

/// Total price of a quote, always derived from its items
pub fn total_cents(items: &[QuoteItem]) -> i64 {
    items
        .iter()
        .map(|item| item.quantity as i64 * item.unit_price_cents)
        .sum()
}

/// Quote with its items and the derived total
#[derive(Debug, Serialize)]
pub struct QuoteWithItems {
    #[serde(flatten)]
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
    pub total_cents: i64,
}

impl QuoteWithItems {
    pub fn new(quote: Quote, items: Vec<QuoteItem>) -> Self {
        let total = total_cents(&items);
        Self {
            quote,
            items,
            total_cents: total,
        }
    }
}

/// One item of a quote creation request
#[derive(Debug, Deserialize, Clone)]
pub struct QuoteItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

/// Request DTO for creating a quote
#[derive(Debug, Deserialize)]
pub struct CreateQuoteRequest {
    pub rfq_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub items: Vec<QuoteItemInput>,
}

impl CreateQuoteRequest {
    /// Validate request shape; referential checks happen in the service
    pub fn validate(&self) -> Result<(), String> {
        match (self.rfq_id, self.conversation_id) {
            (None, None) => {
                return Err("A quote needs an originating RFQ or conversation".to_string())
            }
            (Some(_), Some(_)) => {
                return Err("A quote originates from an RFQ or a conversation, not both".to_string())
            }
            _ => {}
        }

        if self.items.is_empty() {
            return Err("A quote needs at least one item".to_string());
        }

        for item in &self.items {
            if item.quantity < 1 {
                return Err("Item quantity must be at least 1".to_string());
            }
            if item.unit_price_cents < 0 {
                return Err("Item unit price must not be negative".to_string());
            }
        }

        Ok(())
    }
}

/// One item of a quote update: with an id it patches the existing row,
/// without one it is inserted as a new line
#[derive(Debug, Deserialize, Clone)]
pub struct UpdateQuoteItemInput {
    pub id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub unit_price_cents: Option<i64>,
}

/// Request DTO for updating a quote's items pre-accept
#[derive(Debug, Deserialize)]
pub struct UpdateQuoteRequest {
    /// When true, existing items are dropped and the given items replace
    /// them wholesale; otherwise items are merged by id
    #[serde(default)]
    pub replace: bool,
    pub items: Vec<UpdateQuoteItemInput>,
}

impl UpdateQuoteRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("An update needs at least one item".to_string());
        }

        for item in &self.items {
            let is_new = item.id.is_none() || self.replace;
            if is_new && (item.product_id.is_none() || item.quantity.is_none() || item.unit_price_cents.is_none())
            {
                return Err(
                    "New items need product_id, quantity, and unit_price_cents".to_string()
                );
            }
            if let Some(quantity) = item.quantity {
                if quantity < 1 {
                    return Err("Item quantity must be at least 1".to_string());
                }
            }
            if let Some(price) = item.unit_price_cents {
                if price < 0 {
                    return Err("Item unit price must not be negative".to_string());
                }
            }
        }

        Ok(())
    }
}

/// Request DTO accompanying a buyer's accept; carries the contract
/// boilerplate frozen into the new contract
#[derive(Debug, Deserialize, Validate)]
pub struct AcceptQuoteRequest {
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[validate(length(min = 1, max = 1024))]
    pub shipping_address: String,
    #[validate(length(min = 1, max = 1024))]
    pub billing_address: String,
    #[validate(length(min = 50, max = 10000))]
    pub terms_and_conditions: String,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Query parameters for listing quotes
#[derive(Debug, Deserialize)]
pub struct ListQuotesQuery {
    pub status: Option<QuoteStatus>,
    pub rfq_id: Option<Uuid>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i32, unit_price_cents: i64) -> QuoteItem {
        QuoteItem {
            id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn test_total_is_derived_from_items() {
        // 2 x 10.00 + 1 x 5.00 = 25.00
        let mut items = vec![item(2, 1000), item(1, 500)];
        assert_eq!(total_cents(&items), 2500);

        // Bumping the first item's quantity to 3 yields 35.00
        items[0].quantity = 3;
        assert_eq!(total_cents(&items), 3500);

        assert_eq!(total_cents(&[]), 0);
    }

    #[test]
    fn test_create_request_needs_exactly_one_origin() {
        let items = vec![QuoteItemInput {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price_cents: 100,
        }];

        let req = CreateQuoteRequest {
            rfq_id: None,
            conversation_id: None,
            items: items.clone(),
        };
        assert!(req.validate().is_err());

        let req = CreateQuoteRequest {
            rfq_id: Some(Uuid::new_v4()),
            conversation_id: Some(Uuid::new_v4()),
            items: items.clone(),
        };
        assert!(req.validate().is_err());

        let req = CreateQuoteRequest {
            rfq_id: Some(Uuid::new_v4()),
            conversation_id: None,
            items,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_item_bounds() {
        let base = |items| CreateQuoteRequest {
            rfq_id: Some(Uuid::new_v4()),
            conversation_id: None,
            items,
        };

        assert!(base(vec![]).validate().is_err());

        assert!(base(vec![QuoteItemInput {
            product_id: Uuid::new_v4(),
            quantity: 0,
            unit_price_cents: 100,
        }])
        .validate()
        .is_err());

        assert!(base(vec![QuoteItemInput {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price_cents: -1,
        }])
        .validate()
        .is_err());

        // Zero price is allowed (free samples)
        assert!(base(vec![QuoteItemInput {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price_cents: 0,
        }])
        .validate()
        .is_ok());
    }

    #[test]
    fn test_update_request_new_items_need_full_fields() {
        let req = UpdateQuoteRequest {
            replace: false,
            items: vec![UpdateQuoteItemInput {
                id: None,
                product_id: Some(Uuid::new_v4()),
                quantity: None,
                unit_price_cents: Some(100),
            }],
        };
        assert!(req.validate().is_err());

        let req = UpdateQuoteRequest {
            replace: false,
            items: vec![UpdateQuoteItemInput {
                id: Some(Uuid::new_v4()),
                product_id: None,
                quantity: Some(3),
                unit_price_cents: None,
            }],
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_quote_status_terminal() {
        assert!(!QuoteStatus::Sent.is_terminal());
        assert!(QuoteStatus::Accepted.is_terminal());
        assert!(QuoteStatus::Rejected.is_terminal());
    }
}
