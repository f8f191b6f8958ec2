//! Database module
//!
//! Persistence for user accounts, chat transcripts and email verification
//! codes.

mod schema;

pub use schema::*;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("User already exists: {0}")]
    UserExists(String),
    #[error("Google account already linked to another user: {0}")]
    GoogleIdTaken(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

const USER_COLUMNS: &str =
    "id, email, hashed_password, full_name, is_verified, google_id, created_at, updated_at";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Round-trip check used at startup
    pub fn ping(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Create a new user
    pub fn create_user(&self, new_user: &NewUser<'_>) -> DbResult<User> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, email, hashed_password, full_name, is_verified, google_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                new_user.email,
                new_user.hashed_password,
                new_user.full_name,
                new_user.is_verified,
                new_user.google_id,
                format_datetime(&now),
            ],
        )
        .map_err(|e| user_conflict(e, new_user.email, new_user.google_id))?;

        Ok(User {
            id,
            email: new_user.email.to_string(),
            hashed_password: new_user.hashed_password.map(String::from),
            full_name: new_user.full_name.map(String::from),
            is_verified: new_user.is_verified,
            google_id: new_user.google_id.map(String::from),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get user by ID
    pub fn get_user(&self, id: &str) -> DbResult<User> {
        self.find_user("id", id)?
            .ok_or_else(|| DbError::UserNotFound(id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        self.find_user("email", email)
    }

    pub fn get_user_by_google_id(&self, google_id: &str) -> DbResult<Option<User>> {
        self.find_user("google_id", google_id)
    }

    fn find_user(&self, column: &'static str, value: &str) -> DbResult<Option<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
        ))?;
        stmt.query_row(params![value], user_from_row)
            .optional()
            .map_err(DbError::from)
    }

    /// Attach a Google identity to an existing account.
    ///
    /// Linking marks the account verified and fills `full_name` only when it
    /// was empty.
    pub fn link_google_account(
        &self,
        user_id: &str,
        google_id: &str,
        full_name: Option<&str>,
    ) -> DbResult<User> {
        {
            let conn = self.conn()?;
            let updated = conn
                .execute(
                    "UPDATE users
                     SET google_id = ?1, is_verified = 1,
                         full_name = COALESCE(NULLIF(full_name, ''), ?2),
                         updated_at = ?3
                     WHERE id = ?4",
                    params![google_id, full_name, format_datetime(&Utc::now()), user_id],
                )
                .map_err(|e| user_conflict(e, "", Some(google_id)))?;
            if updated == 0 {
                return Err(DbError::UserNotFound(user_id.to_string()));
            }
        }
        self.get_user(user_id)
    }

    pub fn set_user_verified(&self, user_id: &str, verified: bool) -> DbResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET is_verified = ?1, updated_at = ?2 WHERE id = ?3",
            params![verified, format_datetime(&Utc::now()), user_id],
        )?;
        if updated == 0 {
            return Err(DbError::UserNotFound(user_id.to_string()));
        }
        Ok(())
    }

    // ==================== Transcript Operations ====================

    /// Append a transcript row
    pub fn save_message(
        &self,
        message_type: MessageType,
        content: &str,
        user_id: Option<&str>,
    ) -> DbResult<HistoryEntry> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO history (id, message_type, content, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, message_type.as_str(), content, user_id, format_datetime(&now)],
        )?;

        tracing::debug!(
            message_type = %message_type,
            preview = %preview(content),
            "Message saved"
        );

        Ok(HistoryEntry {
            id,
            message_type,
            content: content.to_string(),
            user_id: user_id.map(String::from),
            created_at: now,
        })
    }

    /// Most recent rows first; restricted to one user when `user_id` is set
    pub fn get_recent_messages(
        &self,
        limit: u32,
        user_id: Option<&str>,
    ) -> DbResult<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, message_type, content, user_id, created_at
             FROM history
             WHERE ?1 IS NULL OR user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                message_type: row.get(1)?,
                content: row.get(2)?,
                user_id: row.get(3)?,
                created_at: datetime_column(row, 4)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    // ==================== Verification Codes ====================

    /// Store a code for `user_id` that stays valid for `ttl`
    pub fn create_verification_code(
        &self,
        user_id: &str,
        code: &str,
        ttl: Duration,
    ) -> DbResult<VerificationCode> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + ttl;

        conn.execute(
            "INSERT INTO verification_codes (id, user_id, code, expires_at, used, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                id,
                user_id,
                code,
                format_datetime(&expires_at),
                format_datetime(&now)
            ],
        )?;

        Ok(VerificationCode {
            id,
            user_id: user_id.to_string(),
            code: code.to_string(),
            expires_at,
            used: false,
            created_at: now,
        })
    }

    /// Mark a matching, unused, unexpired code as used.
    ///
    /// Returns `false` when no such code exists.
    pub fn consume_verification_code(
        &self,
        user_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE verification_codes SET used = 1
             WHERE id = (
                 SELECT id FROM verification_codes
                 WHERE user_id = ?1 AND code = ?2 AND used = 0 AND expires_at > ?3
                 ORDER BY created_at DESC
                 LIMIT 1
             )",
            params![user_id, code, format_datetime(&now)],
        )?;
        Ok(updated > 0)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        hashed_password: row.get(2)?,
        full_name: row.get(3)?,
        is_verified: row.get(4)?,
        google_id: row.get(5)?,
        created_at: datetime_column(row, 6)?,
        updated_at: datetime_column(row, 7)?,
    })
}

/// Fixed-width timestamps so text ordering matches time ordering
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read an RFC 3339 column; unparseable text is a conversion error
fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a UNIQUE violation on `users` to the column that clashed
fn user_conflict(e: rusqlite::Error, email: &str, google_id: Option<&str>) -> DbError {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e {
        if err.code == ErrorCode::ConstraintViolation {
            if msg.contains("users.email") {
                return DbError::UserExists(email.to_string());
            }
            if msg.contains("users.google_id") {
                return DbError::GoogleIdTaken(google_id.unwrap_or_default().to_string());
            }
        }
    }
    DbError::Sqlite(e)
}

fn preview(content: &str) -> String {
    content.chars().take(50).collect()
}
