//! # clinic-assistant
//!
//! Conversational assistant for checking doctor availability and booking
//! clinic appointments.
//!
//! ## Overview
//!
//! A language model drives a tool-calling loop. The tools read and edit
//! either a CSV availability sheet or appointment documents kept in an
//! embedded SQLite file. Conversations are checkpointed per thread and can
//! be held in the terminal or through a small browser chat page.
//!
//! ## Core Concepts
//!
//! - **Slots**: `DD-MM-YYYY HH:MM` strings per doctor, booked by flipping `is_available`
//! - **Tools**: named operations with JSON-schema arguments and text results
//! - **Threads**: a conversation's message list, restored on every turn
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use clinic_assistant::agent::{Agent, AgentConfig, MemoryCheckpointer};
//! use clinic_assistant::config::AppConfig;
//! use clinic_assistant::llm::OpenAiCompatible;
//! use clinic_assistant::schedule::SlotService;
//! use clinic_assistant::store::CsvSlotStore;
//! use clinic_assistant::tools::ToolRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = AppConfig::default();
//!     config.apply_env();
//!     let model = Arc::new(OpenAiCompatible::new(&config.llm, config.api_key()?)?);
//!     let slots = SlotService::new(Arc::new(CsvSlotStore::new("doctor_availability.csv")));
//!     let agent = Agent::new(
//!         model.clone(),
//!         ToolRegistry::csv_toolset(slots, model)?,
//!         Arc::new(MemoryCheckpointer::new()),
//!         AgentConfig::default(),
//!     );
//!     println!("{}", agent.invoke("10", "Is Dr. Lisa Brown free on 05-08-2024?").await?);
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod schedule;
pub mod llm;
pub mod tools;
pub mod agent;
pub mod gateway;
pub mod cli;

// Re-export commonly used types
pub use types::{Appointment, AppointmentStatus, AvailabilitySlot};
pub use error::{Error, Result};
pub use config::AppConfig;
pub use agent::Agent;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
