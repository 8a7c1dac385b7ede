//! Conversation listing and archiving handlers.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};

use crate::logging;
use crate::storage::ConversationSummary;
use crate::web::auth::AuthUser;
use crate::web::state::SharedState;
use crate::web::utils::{ApiError, ApiResult, Reply};

pub async fn list_conversations_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> ApiResult<Vec<ConversationSummary>> {
    let st = state.lock().await;
    let conversations = st.storage.list_conversations(auth.id())?;
    Ok(Reply::ok(conversations))
}

async fn set_archived(
    state: SharedState,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    archived: bool,
) -> ApiResult<()> {
    let Path(other_id) = path?;
    let st = state.lock().await;
    if !st
        .storage
        .set_conversation_archived(auth.id(), other_id, archived)?
    {
        return Err(ApiError::not_found("Conversation not found"));
    }
    crate::clog!(
        "conversation: {} {} chat with {}",
        logging::user_id(auth.id()),
        if archived { "archived" } else { "restored" },
        logging::user_id(other_id)
    );
    let message = if archived {
        "Conversation archived"
    } else {
        "Conversation restored"
    };
    Ok(Reply::ok(()).with_message(message))
}

pub async fn archive_conversation_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    set_archived(state, auth, path, true).await
}

pub async fn unarchive_conversation_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<()> {
    set_archived(state, auth, path, false).await
}
