//! User directory and profile handlers.

use axum::extract::State;

use crate::storage::{DirectoryEntry, UserRow};
use crate::web::auth::AuthUser;
use crate::web::state::SharedState;
use crate::web::utils::{ApiResult, Reply};

pub async fn list_users_handler(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> ApiResult<Vec<DirectoryEntry>> {
    let st = state.lock().await;
    let users = st.storage.list_other_users(auth.id())?;
    Ok(Reply::ok(users))
}

pub async fn me_handler(auth: AuthUser) -> ApiResult<UserRow> {
    Ok(Reply::ok(auth.0))
}
