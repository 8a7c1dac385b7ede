//! Message sending, history, read/delete, unread count and search handlers.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::logging;
use crate::storage::{MessageType, MessageView, NewMessage};
use crate::web::auth::AuthUser;
use crate::web::config::{DEFAULT_PAGE_LIMIT, DEFAULT_SEARCH_LIMIT, MAX_MESSAGE_CHARS};
use crate::web::state::SharedState;
use crate::web::utils::{page_from, ApiError, ApiResult, Reply};

// -- Send message --

#[derive(Deserialize)]
pub struct SendMessageRequest {
    receiver_id: Option<i64>,
    message: Option<String>,
    message_type: Option<String>,
    file_path: Option<String>,
    file_name: Option<String>,
}

pub async fn send_message_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult<MessageView> {
    let Json(req) = payload?;

    let (receiver_id, body) = match (req.receiver_id, req.message) {
        (Some(r), Some(m)) if !m.trim().is_empty() => (r, m),
        _ => return Err(ApiError::bad_request("Receiver ID and message are required")),
    };
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "Message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    let message_type = match req.message_type.as_deref() {
        None => MessageType::Text,
        Some(raw) => MessageType::parse(raw)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown message type: {raw}")))?,
    };

    let new_message = NewMessage {
        sender_id: auth.id(),
        receiver_id,
        body,
        message_type,
        file_path: req.file_path,
        file_name: req.file_name,
    };

    let st = state.lock().await;
    let view = st.storage.send_message(&new_message)?;

    crate::clog!(
        "send: {} -> {} ({})",
        logging::user_id(view.sender_id),
        logging::user_id(view.receiver_id),
        logging::msg_id(view.id)
    );

    Ok(Reply::created(view).with_message("Message sent"))
}

// -- Conversation history --

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<u32>,
    offset: Option<u32>,
    before: Option<i64>,
}

pub async fn history_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Vec<MessageView>> {
    let Path(other_id) = path?;
    let Query(params) = query?;
    let page = page_from(params.limit, params.offset, DEFAULT_PAGE_LIMIT);

    let st = state.lock().await;
    let messages =
        st.storage
            .list_conversation_messages(auth.id(), other_id, params.before, page)?;
    let marked = st.storage.mark_conversation_read(auth.id(), other_id)?;
    if marked > 0 {
        crate::clog!(
            "history: {} read {} message(s) from {}",
            logging::user_id(auth.id()),
            marked,
            logging::user_id(other_id)
        );
    }

    Ok(Reply::ok(messages))
}

// -- Mark message as read --

pub async fn mark_read_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(message_id) = path?;
    let st = state.lock().await;
    if st.storage.mark_message_read(message_id, auth.id())? {
        Ok(Reply::ok(()).with_message("Message marked as read"))
    } else {
        Err(ApiError::not_found("Message not found or already read"))
    }
}

// -- Soft delete --

pub async fn delete_message_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    let Path(message_id) = path?;
    let st = state.lock().await;
    if st.storage.soft_delete_message(message_id, auth.id())? {
        crate::clog!(
            "delete: {} removed {}",
            logging::user_id(auth.id()),
            logging::msg_id(message_id)
        );
        Ok(Reply::ok(()).with_message("Message deleted"))
    } else {
        Err(ApiError::not_found("Message not found"))
    }
}

// -- Unread count --

#[derive(Serialize)]
pub struct UnreadCount {
    unread_count: u32,
}

pub async fn unread_count_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> ApiResult<UnreadCount> {
    let st = state.lock().await;
    let unread_count = st.storage.count_unread(auth.id())?;
    Ok(Reply::ok(UnreadCount { unread_count }))
}

// -- Search --

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

pub async fn search_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Vec<MessageView>> {
    let Query(params) = query?;
    let q = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => return Err(ApiError::bad_request("Search query is required")),
    };
    let page = page_from(params.limit, params.offset, DEFAULT_SEARCH_LIMIT);

    let st = state.lock().await;
    let messages = st.storage.search_messages(auth.id(), &q, page)?;
    Ok(Reply::ok(messages))
}
