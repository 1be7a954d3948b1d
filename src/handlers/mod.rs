//! API handlers for the TradeLink backend

pub mod admin;
pub mod chat;
pub mod contract;
pub mod quote;
pub mod rfq;

pub use admin::*;
pub use chat::*;
pub use contract::*;
pub use quote::*;
pub use rfq::*;

// Re-export principal extractors for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser};
