//! Appointment CRUD over one document collection.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::document::{DeleteResult, Document, DocumentStore, Filter, UpdateResult};
use crate::error::StoreError;

/// Thin wrapper binding a document store to the appointments collection.
#[derive(Debug, Clone)]
pub struct AppointmentCrud {
    store: Arc<DocumentStore>,
    collection: String,
}

impl AppointmentCrud {
    pub fn new(store: Arc<DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Collection name.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn create_appointment(&self, doc: Value) -> Result<String, StoreError> {
        self.store.collection(&self.collection).insert_one(doc)
    }

    pub fn get_appointments(&self, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.store.collection(&self.collection).find(filter)
    }

    /// Apply `set` to the first document matching `filter`.
    pub fn update_appointment(
        &self,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        self.store.collection(&self.collection).update_one(filter, set)
    }

    /// Delete the first document matching `filter`.
    pub fn delete_appointment(&self, filter: &Filter) -> Result<DeleteResult, StoreError> {
        self.store.collection(&self.collection).delete_one(filter)
    }

    /// Distinct (doctor_name, specialization) pairs, optionally narrowed to
    /// one specialization.
    pub fn get_all_doctors(&self, specialization: Option<&str>) -> Result<Vec<Document>, StoreError> {
        let filter = match specialization {
            Some(spec) => Filter::eq([("specialization", spec)]),
            None => Filter::All,
        };

        let mut doctors: Vec<Document> = Vec::new();
        for doc in self.get_appointments(&filter)? {
            let Some(name) = doc.get("doctor_name") else {
                continue;
            };

            let mut projected = Map::new();
            projected.insert("doctor_name".to_string(), name.clone());
            projected.insert(
                "specialization".to_string(),
                doc.get("specialization").cloned().unwrap_or(Value::Null),
            );

            if !doctors.contains(&projected) {
                doctors.push(projected);
            }
        }

        Ok(doctors)
    }
}
