//! SQLite storage layer for practicum messaging.
//!
//! Owns the schema and every query the web layer runs: users and their API
//! tokens, direct messages, and the per-pair conversation index that is kept
//! up to date alongside each send.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Enumerations stored as text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Supervisor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Supervisor => "supervisor",
        }
    }

    /// Human-readable label shown in the user directory.
    pub fn label(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::Supervisor => "Supervisor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "supervisor" => Some(Role::Supervisor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    File,
    Image,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::File => "file",
            MessageType::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            "file" => Some(MessageType::File),
            "image" => Some(MessageType::Image),
            _ => None,
        }
    }
}

fn role_from_sql(idx: usize, raw: String) -> rusqlite::Result<Role> {
    Role::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown role: {raw}").into(),
        )
    })
}

fn message_type_from_sql(idx: usize, raw: String) -> rusqlite::Result<MessageType> {
    MessageType::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown message type: {raw}").into(),
        )
    })
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A registered user. The API token itself is never stored, only its hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub email: Option<String>,
    pub created_at: u64,
}

/// Entry in the user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub role_label: String,
}

/// Fields supplied by the sender when creating a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub body: String,
    pub message_type: MessageType,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
}

/// A message joined with the display fields of both parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message: String,
    pub message_type: MessageType,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub sent_at: u64,
    pub is_read: bool,
    pub read_at: Option<u64>,
    pub sender_name: String,
    pub sender_role: Role,
    pub receiver_name: String,
    pub receiver_role: Role,
}

/// Stored conversation row for an unordered participant pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: i64,
    pub participant_1: i64,
    pub participant_2: i64,
    pub last_message_id: Option<i64>,
    pub last_activity: u64,
    pub is_archived: bool,
    pub created_at: u64,
}

/// Conversation as seen by one participant in the conversation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    pub other_user_id: i64,
    pub other_username: String,
    pub other_full_name: String,
    pub other_role: Role,
    pub last_message_id: Option<i64>,
    /// `None` when the last message was soft-deleted.
    pub last_message: Option<String>,
    pub last_message_type: Option<MessageType>,
    pub last_message_sender_id: Option<i64>,
    pub last_activity: u64,
    pub unread_count: u32,
}

/// Pagination window shared by the history and search queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

/// Order two participant ids so the smaller comes first.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

const MESSAGE_VIEW_COLUMNS: &str = "
    m.id, m.sender_id, m.receiver_id, m.body, m.message_type,
    m.file_path, m.file_name, m.sent_at, m.is_read, m.read_at,
    s.full_name, s.role, r.full_name, r.role";

const MESSAGE_VIEW_JOINS: &str = "
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.receiver_id";

fn message_view_from_row(row: &Row<'_>) -> rusqlite::Result<MessageView> {
    Ok(MessageView {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        message: row.get(3)?,
        message_type: message_type_from_sql(4, row.get(4)?)?,
        file_path: row.get(5)?,
        file_name: row.get(6)?,
        sent_at: row.get::<_, i64>(7)? as u64,
        is_read: row.get::<_, i32>(8)? != 0,
        read_at: row.get::<_, Option<i64>>(9)?.map(|t| t as u64),
        sender_name: row.get(10)?,
        sender_role: role_from_sql(11, row.get(11)?)?,
        receiver_name: row.get(12)?,
        receiver_role: role_from_sql(13, row.get(13)?)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        role: role_from_sql(3, row.get(3)?)?,
        email: row.get(4)?,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_1: row.get(1)?,
        participant_2: row.get(2)?,
        last_message_id: row.get(3)?,
        last_activity: row.get::<_, i64>(4)? as u64,
        is_archived: row.get::<_, i32>(5)? != 0,
        created_at: row.get::<_, i64>(6)? as u64,
    })
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Hash an API token for storage and lookup.
pub fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Register `unicode_lower(text)`, a full Unicode lowercase fold. SQLite's
/// built-in `LOWER()` only folds ASCII.
fn register_functions(conn: &Connection) -> Result<(), StorageError> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path, creating its parent
    /// directory and the schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        register_functions(&conn)?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        register_functions(&conn)?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                full_name   TEXT NOT NULL,
                role        TEXT NOT NULL CHECK (role IN ('student', 'teacher', 'supervisor')),
                email       TEXT,
                token_hash  TEXT NOT NULL UNIQUE,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       INTEGER NOT NULL REFERENCES users(id),
                receiver_id     INTEGER NOT NULL REFERENCES users(id),
                body            TEXT NOT NULL,
                message_type    TEXT NOT NULL DEFAULT 'text',
                file_path       TEXT,
                file_name       TEXT,
                sent_at         INTEGER NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0,
                read_at         INTEGER,
                is_deleted      INTEGER NOT NULL DEFAULT 0,
                deleted_at      INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_messages_pair
                ON messages(sender_id, receiver_id, id);
            CREATE INDEX IF NOT EXISTS idx_messages_unread
                ON messages(receiver_id, is_read, is_deleted);

            CREATE TABLE IF NOT EXISTS conversations (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                participant_1   INTEGER NOT NULL REFERENCES users(id),
                participant_2   INTEGER NOT NULL REFERENCES users(id),
                last_message_id INTEGER REFERENCES messages(id),
                last_activity   INTEGER NOT NULL,
                is_archived     INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL,
                CHECK (participant_1 < participant_2),
                UNIQUE (participant_1, participant_2)
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_p2
                ON conversations(participant_2);
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Register a user and return it along with a freshly issued API token.
    /// The plain token is only available here.
    pub fn create_user(
        &self,
        username: &str,
        full_name: &str,
        role: Role,
        email: Option<&str>,
    ) -> Result<(UserRow, String), StorageError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StorageError::Invalid("username is required".into()));
        }
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StorageError::AlreadyExists(format!("user {username}")));
        }

        let token = generate_token();
        let now = now_secs();
        self.conn.execute(
            "INSERT INTO users (username, full_name, role, email, token_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                username,
                full_name.trim(),
                role.as_str(),
                email,
                hash_token(&token),
                now as i64,
            ],
        )?;
        let user = UserRow {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
            full_name: full_name.trim().to_string(),
            role,
            email: email.map(str::to_string),
            created_at: now,
        };
        Ok((user, token))
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<UserRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, username, full_name, role, email, created_at
                 FROM users WHERE id = ?1",
                params![user_id],
                user_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Resolve a bearer token to its user.
    pub fn get_user_by_token(&self, token: &str) -> Result<Option<UserRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, username, full_name, role, email, created_at
                 FROM users WHERE token_hash = ?1",
                params![hash_token(token)],
                user_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Every user except `user_id`, ordered by role then name.
    pub fn list_other_users(&self, user_id: i64) -> Result<Vec<DirectoryEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, full_name, role
             FROM users
             WHERE id != ?1
             ORDER BY CASE role
                        WHEN 'supervisor' THEN 0
                        WHEN 'teacher' THEN 1
                        ELSE 2
                      END,
                      full_name COLLATE NOCASE, id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let role = role_from_sql(3, row.get(3)?)?;
            Ok(DirectoryEntry {
                id: row.get(0)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
                role,
                role_label: role.label().to_string(),
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_users(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Store a message and bring the pair's conversation up to date.
    ///
    /// The insert and the conversation upsert commit together. The returned
    /// view carries the display fields of both parties.
    pub fn send_message(&self, msg: &NewMessage) -> Result<MessageView, StorageError> {
        self.send_message_at(msg, now_secs())
    }

    pub(crate) fn send_message_at(
        &self,
        msg: &NewMessage,
        sent_at: u64,
    ) -> Result<MessageView, StorageError> {
        if msg.sender_id == msg.receiver_id {
            return Err(StorageError::Invalid("cannot message yourself".into()));
        }
        if self.get_user(msg.receiver_id)?.is_none() {
            return Err(StorageError::NotFound(format!("user {}", msg.receiver_id)));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO messages
             (sender_id, receiver_id, body, message_type, file_path, file_name, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                msg.sender_id,
                msg.receiver_id,
                msg.body,
                msg.message_type.as_str(),
                msg.file_path,
                msg.file_name,
                sent_at as i64,
            ],
        )?;
        let message_id = tx.last_insert_rowid();

        let (p1, p2) = canonical_pair(msg.sender_id, msg.receiver_id);
        tx.execute(
            "INSERT INTO conversations
             (participant_1, participant_2, last_message_id, last_activity, is_archived, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?4)
             ON CONFLICT(participant_1, participant_2) DO UPDATE SET
                last_message_id = excluded.last_message_id,
                last_activity = excluded.last_activity,
                is_archived = 0",
            params![p1, p2, message_id, sent_at as i64],
        )?;
        tx.commit()?;

        self.get_message_view(message_id)?
            .ok_or_else(|| StorageError::NotFound(format!("message {message_id}")))
    }

    /// Fetch one message with display fields, including soft-deleted ones.
    pub fn get_message_view(&self, message_id: i64) -> Result<Option<MessageView>, StorageError> {
        let sql = format!("SELECT {MESSAGE_VIEW_COLUMNS} {MESSAGE_VIEW_JOINS} WHERE m.id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![message_id], message_view_from_row)
            .optional()?;
        Ok(row)
    }

    /// Non-deleted messages between two users, oldest first.
    ///
    /// The window is taken from the newest end: `offset` skips the most
    /// recent messages and `before` only admits ids strictly below it.
    pub fn list_conversation_messages(
        &self,
        user_id: i64,
        other_id: i64,
        before: Option<i64>,
        page: Page,
    ) -> Result<Vec<MessageView>, StorageError> {
        let mut sql = format!(
            "SELECT {MESSAGE_VIEW_COLUMNS} {MESSAGE_VIEW_JOINS}
             WHERE m.is_deleted = 0
               AND ((m.sender_id = ?1 AND m.receiver_id = ?2)
                 OR (m.sender_id = ?2 AND m.receiver_id = ?1))"
        );
        let mut bind_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(user_id), Box::new(other_id)];

        if let Some(b) = before {
            sql.push_str(" AND m.id < ?");
            bind_values.push(Box::new(b));
        }
        sql.push_str(" ORDER BY m.id DESC LIMIT ? OFFSET ?");
        bind_values.push(Box::new(page.limit as i64));
        bind_values.push(Box::new(page.offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let bind_refs: Vec<&dyn rusqlite::types::ToSql> =
            bind_values.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(bind_refs.as_slice(), message_view_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        result.reverse();
        Ok(result)
    }

    /// Mark every unread message from `sender_id` to `receiver_id` as read.
    /// Returns how many rows changed.
    pub fn mark_conversation_read(
        &self,
        receiver_id: i64,
        sender_id: i64,
    ) -> Result<u32, StorageError> {
        let affected = self.conn.execute(
            "UPDATE messages SET is_read = 1, read_at = ?1
             WHERE receiver_id = ?2 AND sender_id = ?3
               AND is_read = 0 AND is_deleted = 0",
            params![now_secs() as i64, receiver_id, sender_id],
        )?;
        Ok(affected as u32)
    }

    /// Mark one message read if `receiver_id` received it and it is unread.
    pub fn mark_message_read(&self, message_id: i64, receiver_id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE messages SET is_read = 1, read_at = ?1
             WHERE id = ?2 AND receiver_id = ?3 AND is_read = 0 AND is_deleted = 0",
            params![now_secs() as i64, message_id, receiver_id],
        )?;
        Ok(affected > 0)
    }

    /// Hide a message if `sender_id` sent it and it is not already hidden.
    pub fn soft_delete_message(&self, message_id: i64, sender_id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE messages SET is_deleted = 1, deleted_at = ?1
             WHERE id = ?2 AND sender_id = ?3 AND is_deleted = 0",
            params![now_secs() as i64, message_id, sender_id],
        )?;
        Ok(affected > 0)
    }

    pub fn count_unread(&self, user_id: i64) -> Result<u32, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE receiver_id = ?1 AND is_read = 0 AND is_deleted = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Unread messages from one counterpart.
    pub fn count_unread_from(&self, user_id: i64, other_id: i64) -> Result<u32, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE receiver_id = ?1 AND sender_id = ?2 AND is_read = 0 AND is_deleted = 0",
            params![user_id, other_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    pub fn count_messages(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Case-insensitive substring search over the user's own messages,
    /// newest first.
    pub fn search_messages(
        &self,
        user_id: i64,
        query: &str,
        page: Page,
    ) -> Result<Vec<MessageView>, StorageError> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let sql = format!(
            "SELECT {MESSAGE_VIEW_COLUMNS} {MESSAGE_VIEW_JOINS}
             WHERE m.is_deleted = 0
               AND (m.sender_id = ?1 OR m.receiver_id = ?1)
               AND unicode_lower(m.body) LIKE ?2 ESCAPE '\\'
             ORDER BY m.id DESC
             LIMIT ?3 OFFSET ?4"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![user_id, pattern, page.limit as i64, page.offset as i64],
            message_view_from_row,
        )?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    pub fn get_conversation(
        &self,
        a: i64,
        b: i64,
    ) -> Result<Option<ConversationRow>, StorageError> {
        let (p1, p2) = canonical_pair(a, b);
        let row = self
            .conn
            .query_row(
                "SELECT id, participant_1, participant_2, last_message_id,
                        last_activity, is_archived, created_at
                 FROM conversations WHERE participant_1 = ?1 AND participant_2 = ?2",
                params![p1, p2],
                conversation_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn count_conversations(&self) -> Result<u64, StorageError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// The user's non-archived conversations, most recently active first.
    pub fn list_conversations(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, StorageError> {
        let sql = "
            SELECT
                c.id,
                u.id, u.username, u.full_name, u.role,
                c.last_message_id,
                CASE WHEN m.is_deleted = 1 THEN NULL ELSE m.body END,
                m.message_type,
                m.sender_id,
                c.last_activity,
                (SELECT COUNT(*) FROM messages x
                 WHERE x.sender_id = u.id
                   AND x.receiver_id = ?1
                   AND x.is_read = 0
                   AND x.is_deleted = 0)
            FROM conversations c
            JOIN users u ON u.id = CASE
                    WHEN c.participant_1 = ?1 THEN c.participant_2
                    ELSE c.participant_1
                END
            LEFT JOIN messages m ON m.id = c.last_message_id
            WHERE (c.participant_1 = ?1 OR c.participant_2 = ?1)
              AND c.is_archived = 0
            ORDER BY c.last_activity DESC, c.last_message_id DESC
        ";

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| {
            let last_message_type = match row.get::<_, Option<String>>(7)? {
                Some(raw) => Some(message_type_from_sql(7, raw)?),
                None => None,
            };
            Ok(ConversationSummary {
                conversation_id: row.get(0)?,
                other_user_id: row.get(1)?,
                other_username: row.get(2)?,
                other_full_name: row.get(3)?,
                other_role: role_from_sql(4, row.get(4)?)?,
                last_message_id: row.get(5)?,
                last_message: row.get(6)?,
                last_message_type,
                last_message_sender_id: row.get(8)?,
                last_activity: row.get::<_, i64>(9)? as u64,
                unread_count: row.get::<_, i64>(10)? as u32,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Archive or restore the conversation between two users.
    ///
    /// The flag belongs to the pair's single conversation row, so archiving
    /// hides the conversation from both participants' lists until either
    /// side restores it or sends a new message. Returns false when the pair
    /// has no conversation.
    pub fn set_conversation_archived(
        &self,
        user_id: i64,
        other_id: i64,
        archived: bool,
    ) -> Result<bool, StorageError> {
        let (p1, p2) = canonical_pair(user_id, other_id);
        let affected = self.conn.execute(
            "UPDATE conversations SET is_archived = ?1
             WHERE participant_1 = ?2 AND participant_2 = ?3",
            params![archived as i32, p1, p2],
        )?;
        Ok(affected > 0)
    }
}

/// Resolve the database path: `{data_dir}/practicum-chat.db`.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("practicum-chat.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
