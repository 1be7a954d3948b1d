//! Chat route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/conversations", post(open_conversation))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id/messages", get(list_messages))
        .route("/api/conversations/:id/messages", post(send_message))
        .route("/api/messages/:id/read", post(mark_message_read))
}
