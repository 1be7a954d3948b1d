//! Chat domain module
//!
//! Conversations, messages, read tracking, and the events they broadcast.

mod model;
mod service;

pub use model::*;
pub use service::ChatService;

pub(crate) use service::{
    conversation_created_events, create_contract_conversation_tx, insert_message_tx,
    message_sent_events,
};
