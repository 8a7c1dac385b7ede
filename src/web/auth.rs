//! Bearer-token authentication.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::storage::UserRow;
use crate::web::state::SharedState;
use crate::web::utils::ApiError;

/// The user behind the request's `Authorization: Bearer <token>` header.
/// Rejects with 401 when the header is missing or the token is unknown.
pub struct AuthUser(pub UserRow);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[axum::async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        let st = state.lock().await;
        match st.storage.get_user_by_token(token)? {
            Some(user) => Ok(AuthUser(user)),
            None => Err(ApiError::unauthorized("Invalid token")),
        }
    }
}
