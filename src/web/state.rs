//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::storage::Storage;

/// Process-wide state. Created once at startup and handed to the router;
/// dropping it closes the database.
pub struct AppState {
    pub storage: Storage,
}

impl AppState {
    pub fn shared(storage: Storage) -> SharedState {
        Arc::new(Mutex::new(AppState { storage }))
    }
}

pub type SharedState = Arc<Mutex<AppState>>;
