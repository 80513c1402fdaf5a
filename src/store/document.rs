//! Embedded document store.
//!
//! JSON documents grouped into named collections, kept in a single SQLite
//! table. Queries are field-equality filters evaluated over the documents of
//! one collection; updates and deletes act on the first match, in insertion
//! order, unless the `_many` variant is used.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use regex::Regex;
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A stored document.
pub type Document = Map<String, Value>;

/// Key under which every document carries its identifier.
pub const ID_FIELD: &str = "_id";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    doc_id     TEXT NOT NULL,
    body       TEXT NOT NULL,
    UNIQUE (collection, doc_id)
);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection);
";

/// Selection of documents within a collection.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Every document.
    All,
    /// Documents whose listed fields equal the given values.
    Fields(Document),
    /// Documents where any of `fields` is a string matching `pattern`.
    AnyField { pattern: Regex, fields: Vec<String> },
}

impl Filter {
    /// Build an equality filter from field/value pairs.
    pub fn eq<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Filter::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Check whether a document is selected.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Fields(fields) => fields.iter().all(|(k, v)| doc.get(k) == Some(v)),
            Filter::AnyField { pattern, fields } => fields.iter().any(|f| {
                doc.get(f)
                    .and_then(Value::as_str)
                    .map(|s| pattern.is_match(s))
                    .unwrap_or(false)
            }),
        }
    }
}

/// Counts reported by `update_one`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// Counts reported by the delete operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub deleted: u64,
}

/// SQLite-backed document store.
pub struct DocumentStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Open (or create) a store file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Open a throwaway store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Handle on a named collection. Collections exist once they hold a document.
    pub fn collection(&self, name: &str) -> Collection<'_> {
        Collection {
            store: self,
            name: name.to_string(),
        }
    }

    /// Names of all non-empty collections, sorted.
    pub fn list_collection_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

/// Operations on one collection.
#[derive(Debug)]
pub struct Collection<'a> {
    store: &'a DocumentStore,
    name: String,
}

impl Collection<'_> {
    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn rows(&self) -> Result<Vec<(i64, Document)>, StoreError> {
        let conn = self.store.lock()?;
        self.rows_in(&conn)
    }

    /// Rows of this collection read through a connection the caller already holds.
    fn rows_in(&self, conn: &Connection) -> Result<Vec<(i64, Document)>, StoreError> {
        let mut stmt =
            conn.prepare("SELECT seq, body FROM documents WHERE collection = ?1 ORDER BY seq")?;
        let raw = stmt
            .query_map(params![self.name], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(seq, body)| match serde_json::from_str::<Value>(&body)? {
                Value::Object(doc) => Ok((seq, doc)),
                _ => Err(StoreError::NotAnObject),
            })
            .collect()
    }

    fn prepare_document(doc: Value) -> Result<(String, Document), StoreError> {
        let Value::Object(mut doc) = doc else {
            return Err(StoreError::NotAnObject);
        };

        let id = match doc.get(ID_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        Ok((id, doc))
    }

    /// Insert one document, returning its id.
    pub fn insert_one(&self, doc: Value) -> Result<String, StoreError> {
        let (id, doc) = Self::prepare_document(doc)?;
        let body = serde_json::to_string(&doc)?;

        let conn = self.store.lock()?;
        conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)",
            params![self.name, id, body],
        )?;

        tracing::debug!("Inserted document {} into '{}'", id, self.name);
        Ok(id)
    }

    /// Insert several documents in one transaction.
    pub fn insert_many(&self, docs: Vec<Value>) -> Result<Vec<String>, StoreError> {
        let prepared = docs
            .into_iter()
            .map(Self::prepare_document)
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.store.lock()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(prepared.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)",
            )?;
            for (id, doc) in prepared {
                let body = serde_json::to_string(&doc)?;
                stmt.execute(params![self.name, id, body])?;
                ids.push(id);
            }
        }
        tx.commit()?;

        tracing::debug!("Inserted {} documents into '{}'", ids.len(), self.name);
        Ok(ids)
    }

    /// All matching documents, in insertion order.
    pub fn find(&self, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .rows()?
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| filter.matches(doc))
            .collect())
    }

    /// First matching document.
    pub fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        Ok(self
            .rows()?
            .into_iter()
            .map(|(_, doc)| doc)
            .find(|doc| filter.matches(doc)))
    }

    /// Number of matching documents.
    pub fn count(&self, filter: &Filter) -> Result<usize, StoreError> {
        Ok(self.find(filter)?.len())
    }

    /// Set fields on the first matching document.
    ///
    /// The match and the write happen under one lock.
    pub fn update_one(&self, filter: &Filter, set: Document) -> Result<UpdateResult, StoreError> {
        let conn = self.store.lock()?;
        let Some((seq, mut doc)) = self.rows_in(&conn)?.into_iter().find(|(_, d)| filter.matches(d))
        else {
            return Ok(UpdateResult::default());
        };

        let mut changed = false;
        for (key, value) in set {
            if key == ID_FIELD {
                continue;
            }
            if doc.get(&key) != Some(&value) {
                doc.insert(key, value);
                changed = true;
            }
        }

        if changed {
            let body = serde_json::to_string(&doc)?;
            conn.execute(
                "UPDATE documents SET body = ?1 WHERE seq = ?2",
                params![body, seq],
            )?;
        }

        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(changed),
        })
    }

    /// Delete the first matching document.
    pub fn delete_one(&self, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let conn = self.store.lock()?;
        let Some((seq, _)) = self.rows_in(&conn)?.into_iter().find(|(_, d)| filter.matches(d))
        else {
            return Ok(DeleteResult::default());
        };

        let deleted = conn.execute("DELETE FROM documents WHERE seq = ?1", params![seq])?;
        Ok(DeleteResult {
            deleted: deleted as u64,
        })
    }

    /// Delete every matching document.
    pub fn delete_many(&self, filter: &Filter) -> Result<DeleteResult, StoreError> {
        let mut conn = self.store.lock()?;
        let doomed: Vec<i64> = self
            .rows_in(&conn)?
            .into_iter()
            .filter(|(_, d)| filter.matches(d))
            .map(|(seq, _)| seq)
            .collect();

        let tx = conn.transaction()?;
        let mut deleted = 0u64;
        for seq in doomed {
            deleted += tx.execute("DELETE FROM documents WHERE seq = ?1", params![seq])? as u64;
        }
        tx.commit()?;

        Ok(DeleteResult { deleted })
    }

    /// Distinct values of a field, in first-seen order.
    pub fn distinct(&self, field: &str) -> Result<Vec<Value>, StoreError> {
        let mut seen = Vec::new();
        for (_, doc) in self.rows()? {
            if let Some(value) = doc.get(field) {
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
        }
        Ok(seen)
    }
}
