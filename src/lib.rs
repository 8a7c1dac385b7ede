//! Direct messaging for the teaching-practicum system: students, teachers
//! and supervisors exchange messages over a small REST API backed by SQLite.

pub mod logging;
pub mod storage;
pub mod web;
