//! Quote domain module
//!
//! Models, item arithmetic, and the negotiation service.

mod model;
mod service;

pub use model::*;
pub use service::QuoteService;
