//! Database module for Neur
//!
//! Provides persistence for conversations and messages.

mod schema;

pub use schema::*;

use crate::poll::{ProbeError, ResourceLookup};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Invalid message content: {0}")]
    Content(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

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
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run raw SQL against the store
    #[cfg(test)]
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(sql)?;
        Ok(())
    }

    // ==================== Conversation Operations ====================

    /// Create a new conversation
    pub fn create_conversation(
        &self,
        id: &str,
        user_id: &str,
        title: Option<&str>,
        visibility: Visibility,
    ) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO conversations (id, user_id, title, visibility, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, user_id, title, visibility.as_str(), now.to_rfc3339()],
        )?;

        Ok(Conversation {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: title.map(String::from),
            visibility,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get conversation by ID, `None` if it does not exist (yet)
    pub fn get_conversation(&self, id: &str) -> DbResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, visibility, created_at, updated_at
             FROM conversations WHERE id = ?1",
        )?;

        stmt.query_row(params![id], |row| {
            Ok(Conversation {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                visibility: Visibility::parse(&row.get::<_, String>(3)?),
                created_at: parse_datetime(&row.get::<_, String>(4)?),
                updated_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })
        .optional()
        .map_err(DbError::from)
    }

    /// Set or replace a conversation's title
    #[allow(dead_code)] // Written by the chat pipeline once a title is generated
    pub fn set_title(&self, id: &str, title: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, Utc::now().to_rfc3339(), id],
        )?;
        if rows == 0 {
            return Err(DbError::ConversationNotFound(id.to_string()));
        }
        Ok(())
    }

    // ==================== Message Operations ====================

    /// Add a message to a conversation
    pub fn add_message(
        &self,
        message_id: &str,
        conversation_id: &str,
        role: MessageRole,
        content: &Value,
    ) -> DbResult<Message> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
            params![conversation_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(DbError::ConversationNotFound(conversation_id.to_string()));
        }

        // Get next sequence ID
        let sequence_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;

        let content_str = serde_json::to_string(content)?;

        conn.execute(
            "INSERT INTO messages (message_id, conversation_id, sequence_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message_id,
                conversation_id,
                sequence_id,
                role.to_string(),
                content_str,
                now.to_rfc3339(),
            ],
        )?;

        // Update conversation timestamp
        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), conversation_id],
        )?;

        Ok(Message {
            message_id: message_id.to_string(),
            conversation_id: conversation_id.to_string(),
            sequence_id,
            role,
            content: content.clone(),
            created_at: now,
        })
    }

    /// Get messages for a conversation
    pub fn get_messages(&self, conversation_id: &str) -> DbResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT message_id, conversation_id, sequence_id, role, content, created_at
             FROM messages WHERE conversation_id = ?1 ORDER BY sequence_id ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id], parse_message_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

#[async_trait]
impl ResourceLookup<Conversation> for Database {
    async fn fetch_once(&self, key: &str) -> Result<Option<Conversation>, ProbeError> {
        self.get_conversation(key)
            .map_err(|e| ProbeError::database(e.to_string()))
    }
}

/// Parse a message row from the database
fn parse_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let content_str: String = row.get(4)?;
    Ok(Message {
        message_id: row.get(0)?,
        conversation_id: row.get(1)?,
        sequence_id: row.get(2)?,
        role: MessageRole::parse(&row.get::<_, String>(3)?),
        content: serde_json::from_str(&content_str).unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
