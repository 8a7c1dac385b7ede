//! Health check endpoint.

use axum::extract::State;
use serde::Serialize;

use crate::web::state::SharedState;
use crate::web::utils::{ApiResult, Reply};

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    users: u64,
    messages: u64,
    conversations: u64,
}

pub async fn health_handler(State(state): State<SharedState>) -> ApiResult<Health> {
    let st = state.lock().await;
    Ok(Reply::ok(Health {
        status: "ok",
        users: st.storage.count_users()?,
        messages: st.storage.count_messages()?,
        conversations: st.storage.count_conversations()?,
    }))
}
