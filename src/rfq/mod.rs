//! RFQ domain module
//!
//! Models, transition table, and service for requests for quotation.

mod model;
mod service;

pub use model::*;
pub use service::RfqService;
