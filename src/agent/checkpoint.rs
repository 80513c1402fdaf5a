//! Per-thread persistence of conversation messages.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AgentError, StoreError};
use crate::llm::ChatMessage;

/// Stores the message list of each thread.
pub trait Checkpointer: Send + Sync {
    /// Messages of a thread, or `None` if it has never been saved.
    fn load(&self, thread_id: &str) -> Result<Option<Vec<ChatMessage>>, AgentError>;

    /// Replace the messages of a thread.
    fn save(&self, thread_id: &str, messages: &[ChatMessage]) -> Result<(), AgentError>;
}

/// Checkpoints held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    threads: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn load(&self, thread_id: &str) -> Result<Option<Vec<ChatMessage>>, AgentError> {
        let threads = self
            .threads
            .read()
            .map_err(|_| AgentError::Checkpoint("lock poisoned".to_string()))?;
        Ok(threads.get(thread_id).cloned())
    }

    fn save(&self, thread_id: &str, messages: &[ChatMessage]) -> Result<(), AgentError> {
        let mut threads = self
            .threads
            .write()
            .map_err(|_| AgentError::Checkpoint("lock poisoned".to_string()))?;
        threads.insert(thread_id.to_string(), messages.to_vec());
        Ok(())
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id  TEXT PRIMARY KEY,
    messages   TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Checkpoints kept in a SQLite file, one row per thread.
pub struct SqliteCheckpointer {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointer {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, AgentError> {
        self.conn.lock().map_err(|_| AgentError::from(StoreError::Poisoned))
    }
}

impl Checkpointer for SqliteCheckpointer {
    fn load(&self, thread_id: &str) -> Result<Option<Vec<ChatMessage>>, AgentError> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT messages FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;

        body.map(|b| serde_json::from_str(&b).map_err(|e| AgentError::Checkpoint(e.to_string())))
            .transpose()
    }

    fn save(&self, thread_id: &str, messages: &[ChatMessage]) -> Result<(), AgentError> {
        let body =
            serde_json::to_string(messages).map_err(|e| AgentError::Checkpoint(e.to_string()))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checkpoints (thread_id, messages, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(thread_id) DO UPDATE SET messages = excluded.messages, updated_at = excluded.updated_at",
            params![thread_id, body, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(StoreError::from)?;

        tracing::debug!("Saved {} messages for thread {}", messages.len(), thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use serde_json::json;

    fn conversation() -> Vec<ChatMessage> {
        let call = ToolCall::new("c1", "list_doctors", &json!({}));
        vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("who works here?"),
            ChatMessage::assistant_calls(vec![call.clone()]),
            ChatMessage::tool(&call, "{\"success\": true}"),
            ChatMessage::assistant("Dr. Brown."),
        ]
    }

    fn round_trip(checkpointer: &dyn Checkpointer) {
        assert!(checkpointer.load("10").unwrap().is_none());

        checkpointer.save("10", &conversation()).unwrap();
        assert_eq!(checkpointer.load("10").unwrap().unwrap(), conversation());

        checkpointer.save("10", &conversation()[..2]).unwrap();
        assert_eq!(checkpointer.load("10").unwrap().unwrap().len(), 2);
        assert!(checkpointer.load("11").unwrap().is_none());
    }

    #[test]
    fn test_memory_checkpointer() {
        round_trip(&MemoryCheckpointer::new());
    }

    #[test]
    fn test_sqlite_checkpointer() {
        round_trip(&SqliteCheckpointer::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_checkpointer_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        SqliteCheckpointer::open(&path)
            .unwrap()
            .save("10", &conversation())
            .unwrap();

        let reopened = SqliteCheckpointer::open(&path).unwrap();
        assert_eq!(reopened.load("10").unwrap().unwrap().len(), 5);
    }
}
