//! Route definitions for the TradeLink API

mod admin;
mod chat;
mod contract;
mod quote;
mod rfq;

pub use admin::admin_routes;
pub use chat::chat_routes;
pub use contract::contract_routes;
pub use quote::quote_routes;
pub use rfq::rfq_routes;
