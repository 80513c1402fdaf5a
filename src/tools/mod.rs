//! Tools the agent can call.
//!
//! Each tool advertises a JSON schema for its arguments and returns plain
//! text. Failures meant for the model (no slot, bad format, nothing found)
//! are ordinary return values; `Err` is reserved for bad arguments and
//! storage faults, which the agent reports back as `Error: ...`.

pub mod appointments;
pub mod general;
pub mod slots;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ToolError;
use crate::llm::{ChatModel, ToolSpec};
use crate::schedule::SlotService;
use crate::store::AppointmentCrud;

/// A callable operation exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// What the tool does, as shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Whether the output ends the turn and goes straight to the user.
    fn returns_direct(&self) -> bool {
        false
    }

    /// Run the tool.
    async fn call(&self, args: Value) -> Result<String, ToolError>;

    /// Schema entry sent with each model request.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Decode a tool's arguments object.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Run synchronous store work off the async executor.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ToolError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
}

/// Ordered set of tools, looked up by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    name_index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.name_index.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }

        self.name_index.insert(name.clone(), self.tools.len());
        self.tools.push(tool);
        tracing::debug!("Registered tool '{}'", name);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.name_index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Check if a tool is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Schemas in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Number of registered tools.
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn build(tools: Vec<Arc<dyn Tool>>) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        tracing::info!("Loaded {} tools: {}", registry.count(), registry.names().join(", "));
        Ok(registry)
    }

    /// Tools over the availability sheet.
    pub fn csv_toolset(slots: SlotService, model: Arc<dyn ChatModel>) -> Result<Self, ToolError> {
        Self::build(vec![
            Arc::new(slots::CheckAvailabilityByDoctor::new(slots.clone())),
            Arc::new(slots::CheckAvailabilityBySpecialization::new(slots.clone())),
            Arc::new(slots::SetAppointment::new(slots.clone())),
            Arc::new(slots::RescheduleSlot::new(slots.clone())),
            Arc::new(slots::ConfirmAppointment::new(slots)),
            Arc::new(general::GeneralQuery::new(model)),
        ])
    }

    /// Tools over the appointment documents.
    pub fn document_toolset(crud: AppointmentCrud, model: Arc<dyn ChatModel>) -> Result<Self, ToolError> {
        Self::build(vec![
            Arc::new(appointments::BookAppointment::new(crud.clone())),
            Arc::new(appointments::RescheduleAppointment::new(crud.clone())),
            Arc::new(appointments::CheckAvailability::new(crud.clone())),
            Arc::new(appointments::CancelAppointment::new(crud.clone())),
            Arc::new(general::GeneralQuery::new(model)),
            Arc::new(appointments::ListDoctors::new(crud.clone())),
            Arc::new(appointments::QueryDatabase::new(crud)),
        ])
    }
}
