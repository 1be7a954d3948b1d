//! Contract domain module
//!
//! Models, transition table, and service for the contract lifecycle.

mod model;
mod service;

pub use model::*;
pub use service::ContractService;

pub(crate) use service::create_for_quote_tx;
