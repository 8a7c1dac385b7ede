//! Timestamped, source-located log lines with optional ANSI colour.
//!
//! Every line produced by [`clog!`] has the shape:
//!
//! ```text
//! 20261016T09:14:03.512 - src/web/handlers/messages.rs:88 - send: u-5 -> u-6 (m-41)
//! ```
//!
//! Output goes to stderr unless [`set_writer`] installs another destination,
//! which also turns colour off.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex};

use chrono::Utc;

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_WRITER: LazyLock<Mutex<Box<dyn Write + Send>>> =
    LazyLock::new(|| Mutex::new(Box::new(io::stderr())));

/// Enable colour when stderr is a terminal. Call once at startup.
pub fn init() {
    COLOUR_ENABLED.store(io::stderr().is_terminal(), Ordering::Relaxed);
}

/// Send all subsequent log lines to `w` and disable colour.
pub fn set_writer(w: Box<dyn Write + Send>) {
    COLOUR_ENABLED.store(false, Ordering::Relaxed);
    if let Ok(mut writer) = LOG_WRITER.lock() {
        *writer = w;
    }
}

pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const MSG_ID_COLOUR: &str = "\x1b[93m";

const USER_COLOURS: &[&str] = &[
    "\x1b[91m", "\x1b[92m", "\x1b[94m", "\x1b[95m", "\x1b[96m", "\x1b[32m", "\x1b[34m",
    "\x1b[36m",
];

fn user_colour(id: i64) -> &'static str {
    USER_COLOURS[id.unsigned_abs() as usize % USER_COLOURS.len()]
}

/// Format a user id as `u-<id>`, coloured consistently per user.
pub fn user_id(id: i64) -> String {
    if colour_enabled() {
        format!("{}u-{id}{RESET}", user_colour(id))
    } else {
        format!("u-{id}")
    }
}

/// Format a message id as `m-<id>`.
pub fn msg_id(id: i64) -> String {
    if colour_enabled() {
        format!("{MSG_ID_COLOUR}m-{id}{RESET}")
    } else {
        format!("m-{id}")
    }
}

/// Current UTC wall-clock time as `YYYYMMDDTHH:MM:SS.mmm`.
pub fn format_timestamp() -> String {
    Utc::now().format("%Y%m%dT%H:%M:%S%.3f").to_string()
}

/// Write one line to the current writer. Used by [`clog!`].
pub fn emit(file: &str, line: u32, msg: &str) {
    let ts = format_timestamp();
    let formatted = if colour_enabled() {
        format!("{DIM}{ts}{RESET} {DIM}{file}:{line}{RESET} {msg}")
    } else {
        format!("{ts} - {file}:{line} - {msg}")
    };
    if let Ok(mut writer) = LOG_WRITER.lock() {
        let _ = writeln!(*writer, "{formatted}");
    }
}

/// Log a formatted line with timestamp and source location.
///
/// ```ignore
/// clog!("send: {} -> {}", logging::user_id(5), logging::user_id(6));
/// ```
#[macro_export]
macro_rules! clog {
    ($($arg:tt)*) => {{
        $crate::logging::emit(file!(), line!(), &format!($($arg)*));
    }};
}
