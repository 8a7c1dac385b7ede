//! Axum router construction.

use axum::routing::{get, post, put};
use axum::Router;

use crate::web::handlers;
use crate::web::state::SharedState;
use crate::web::utils::ApiError;

/// Build the complete router. Every `/chat` route requires a bearer token.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_handler))
        // Messages
        .route(
            "/chat/messages",
            post(handlers::messages::send_message_handler),
        )
        .route(
            "/chat/messages/:id",
            get(handlers::messages::history_handler)
                .delete(handlers::messages::delete_message_handler),
        )
        .route(
            "/chat/messages/:id/read",
            put(handlers::messages::mark_read_handler),
        )
        .route(
            "/chat/unread-count",
            get(handlers::messages::unread_count_handler),
        )
        .route("/chat/search", get(handlers::messages::search_handler))
        // Conversations
        .route(
            "/chat/conversations",
            get(handlers::conversations::list_conversations_handler),
        )
        .route(
            "/chat/conversations/:id/archive",
            put(handlers::conversations::archive_conversation_handler),
        )
        .route(
            "/chat/conversations/:id/unarchive",
            put(handlers::conversations::unarchive_conversation_handler),
        )
        // Users
        .route("/chat/users", get(handlers::users::list_users_handler))
        .route("/chat/me", get(handlers::users::me_handler))
        .fallback(|| async { ApiError::not_found("Route not found") })
        .with_state(state)
}
