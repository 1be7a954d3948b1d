//! Broadcast channel names and subscription rules

use std::fmt;
use uuid::Uuid;

use crate::models::UserRole;

/// A typed broadcast channel.
///
/// Wire names:
/// - `conversation.{id}`: one conversation's message stream
/// - `user.{id}.notifications`: a user's private notification feed
/// - `company.{id}.notifications`: a company-wide notification feed
/// - `seller.{id}.products`: a seller's product update feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Conversation(Uuid),
    UserNotifications(Uuid),
    CompanyNotifications(Uuid),
    SellerProducts(Uuid),
}

impl Channel {
    /// Parse a wire channel name; unknown shapes yield None
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            ["conversation", id] => Uuid::parse_str(id).ok().map(Channel::Conversation),
            ["user", id, "notifications"] => {
                Uuid::parse_str(id).ok().map(Channel::UserNotifications)
            }
            ["company", id, "notifications"] => {
                Uuid::parse_str(id).ok().map(Channel::CompanyNotifications)
            }
            ["seller", id, "products"] => Uuid::parse_str(id).ok().map(Channel::SellerProducts),
            _ => None,
        }
    }

    /// Store-free subscription rules.
    ///
    /// Conversation channels need a participant lookup and are authorized
    /// by the caller; this method denies them.
    pub fn allows(&self, user_id: Uuid, company_id: Uuid, role: UserRole) -> bool {
        match self {
            Channel::Conversation(_) => false,
            Channel::UserNotifications(id) => *id == user_id,
            Channel::CompanyNotifications(id) => *id == company_id,
            Channel::SellerProducts(id) => *id == user_id && role == UserRole::Seller,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Conversation(id) => write!(f, "conversation.{}", id),
            Channel::UserNotifications(id) => write!(f, "user.{}.notifications", id),
            Channel::CompanyNotifications(id) => write!(f, "company.{}.notifications", id),
            Channel::SellerProducts(id) => write!(f, "seller.{}.products", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let id = Uuid::new_v4();
        for channel in [
            Channel::Conversation(id),
            Channel::UserNotifications(id),
            Channel::CompanyNotifications(id),
            Channel::SellerProducts(id),
        ] {
            let name = channel.to_string();
            assert_eq!(Channel::parse(&name), Some(channel), "round trip: {}", name);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert_eq!(Channel::parse("conversation"), None);
        assert_eq!(Channel::parse("conversation.not-a-uuid"), None);
        assert_eq!(Channel::parse("user.123.products"), None);
        assert_eq!(
            Channel::parse(&format!("seller.{}.notifications", Uuid::new_v4())),
            None
        );
        assert_eq!(Channel::parse(""), None);
    }

    #[test]
    fn test_user_notifications_requires_own_id() {
        let me = Uuid::new_v4();
        let company = Uuid::new_v4();

        assert!(Channel::UserNotifications(me).allows(me, company, UserRole::Buyer));
        assert!(!Channel::UserNotifications(Uuid::new_v4()).allows(me, company, UserRole::Buyer));
    }

    #[test]
    fn test_company_notifications_requires_membership() {
        let me = Uuid::new_v4();
        let company = Uuid::new_v4();

        assert!(Channel::CompanyNotifications(company).allows(me, company, UserRole::Buyer));
        assert!(
            !Channel::CompanyNotifications(Uuid::new_v4()).allows(me, company, UserRole::Buyer)
        );
    }

    #[test]
    fn test_seller_products_requires_seller_role() {
        let me = Uuid::new_v4();
        let company = Uuid::new_v4();

        assert!(Channel::SellerProducts(me).allows(me, company, UserRole::Seller));
        assert!(!Channel::SellerProducts(me).allows(me, company, UserRole::Buyer));
        assert!(!Channel::SellerProducts(Uuid::new_v4()).allows(me, company, UserRole::Seller));
    }

    #[test]
    fn test_conversation_needs_store_lookup() {
        let me = Uuid::new_v4();
        assert!(!Channel::Conversation(Uuid::new_v4()).allows(me, Uuid::new_v4(), UserRole::Buyer));
    }
}
