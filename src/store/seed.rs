//! Bulk upload of the availability sheet into a document collection.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use super::document::{DocumentStore, Filter};
use super::sheet::parse_flag;
use crate::error::StoreError;

/// How existing documents are treated when seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedMode {
    /// Insert only rows whose doctor is not in the collection yet.
    #[default]
    SkipExistingDoctors,
    /// Empty the collection, then insert every row.
    Replace,
}

/// What a seeding run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub read: usize,
    pub deleted: u64,
    pub inserted: usize,
}

impl std::fmt::Display for SeedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.read == 0 {
            return write!(f, "❌ No data found in CSV.");
        }
        if self.deleted > 0 {
            writeln!(f, "🗑 Cleared {} existing records.", self.deleted)?;
        }
        if self.inserted == 0 {
            write!(f, "✅ No new records to insert. All doctor names already exist.")
        } else {
            write!(f, "✅ Inserted {} new records.", self.inserted)
        }
    }
}

/// Turn one CSV row into a document.
fn row_to_document(headers: &csv::StringRecord, row: &csv::StringRecord) -> Map<String, Value> {
    headers
        .iter()
        .zip(row.iter())
        .map(|(header, cell)| {
            let value = if cell.is_empty() {
                Value::Null
            } else if header == "is_available" {
                parse_flag(cell)
                    .map(Value::Bool)
                    .unwrap_or_else(|| Value::String(cell.to_string()))
            } else {
                Value::String(cell.to_string())
            };
            (header.to_string(), value)
        })
        .collect()
}

/// Read every row of a CSV file as documents.
pub fn read_documents(path: &Path) -> Result<Vec<Map<String, Value>>, StoreError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();

    let mut docs = Vec::new();
    for record in rdr.records() {
        docs.push(row_to_document(&headers, &record?));
    }
    Ok(docs)
}

/// Upload a CSV file into `collection`.
pub fn seed(
    store: &DocumentStore,
    csv_path: &Path,
    collection: &str,
    mode: SeedMode,
) -> Result<SeedReport, StoreError> {
    if !csv_path.exists() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("CSV file not found at: {}", csv_path.display()),
        )));
    }

    let docs = read_documents(csv_path)?;
    let mut report = SeedReport {
        read: docs.len(),
        ..SeedReport::default()
    };
    if docs.is_empty() {
        tracing::warn!("No rows in {}", csv_path.display());
        return Ok(report);
    }

    let coll = store.collection(collection);
    let to_insert: Vec<Value> = match mode {
        SeedMode::Replace => {
            report.deleted = coll.delete_many(&Filter::All)?.deleted;
            tracing::info!("Cleared {} documents from '{}'", report.deleted, collection);
            docs.into_iter().map(Value::Object).collect()
        }
        SeedMode::SkipExistingDoctors => {
            let existing = coll.distinct("doctor_name")?;
            docs.into_iter()
                .filter(|doc| {
                    doc.get("doctor_name")
                        .map(|name| !existing.contains(name))
                        .unwrap_or(true)
                })
                .map(Value::Object)
                .collect()
        }
    };

    if !to_insert.is_empty() {
        report.inserted = coll.insert_many(to_insert)?.len();
    }

    tracing::info!(
        "Seeded '{}' from {}: {} inserted",
        collection,
        csv_path.display(),
        report.inserted
    );
    Ok(report)
}
