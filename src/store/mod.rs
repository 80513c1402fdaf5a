//! Storage backends.
//!
//! The availability sheet lives in a CSV file; appointments, seeded slots
//! and conversation checkpoints live in an embedded SQLite file.

pub mod crud;
pub mod document;
pub mod seed;
pub mod sheet;

pub use crud::AppointmentCrud;
pub use document::{Collection, DeleteResult, Document, DocumentStore, Filter, UpdateResult};
pub use seed::{seed, SeedMode, SeedReport};
pub use sheet::{CsvSlotStore, Edit, SlotSheet};
