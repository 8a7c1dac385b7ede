//! Route handler modules for the messaging REST API.

pub mod conversations;
pub mod health;
pub mod messages;
pub mod users;
