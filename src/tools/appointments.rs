//! Tools over the appointment documents.
//!
//! Results are JSON objects rendered as text, except `query_database`,
//! whose formatted listing is shown to the user as is.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{blocking, parse_args, Tool};
use crate::error::ToolError;
use crate::store::document::ID_FIELD;
use crate::store::{AppointmentCrud, Document, Filter};
use crate::types::Appointment;

fn string_props(names: &[&str]) -> Value {
    let properties: Map<String, Value> = names
        .iter()
        .map(|n| (n.to_string(), json!({"type": "string"})))
        .collect();
    json!({"type": "object", "properties": properties, "required": names})
}

#[derive(Deserialize)]
struct Slot {
    patient_name: String,
    doctor_name: String,
    date: String,
    time: String,
}

impl Slot {
    fn filter(&self) -> Filter {
        Filter::eq([
            ("patient_name", self.patient_name.as_str()),
            ("doctor_name", self.doctor_name.as_str()),
            ("date", self.date.as_str()),
            ("time", self.time.as_str()),
        ])
    }
}

/// Create an appointment document.
pub struct BookAppointment {
    crud: AppointmentCrud,
}

impl BookAppointment {
    pub fn new(crud: AppointmentCrud) -> Self {
        Self { crud }
    }
}

#[async_trait]
impl Tool for BookAppointment {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Book a new appointment"
    }

    fn parameters(&self) -> Value {
        string_props(&["patient_name", "doctor_name", "date", "time"])
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let slot: Slot = parse_args(self.name(), args)?;
        let crud = self.crud.clone();
        blocking(move || {
            let appointment =
                Appointment::booked(&slot.patient_name, &slot.doctor_name, &slot.date, &slot.time);
            let doc = serde_json::to_value(&appointment)
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
            let id = crud.create_appointment(doc)?;
            tracing::info!("Booked appointment {} with {}", id, slot.doctor_name);
            Ok(json!({"success": true, "appointment_id": id}).to_string())
        })
        .await
    }
}

/// Report appointments a doctor already has on a date.
pub struct CheckAvailability {
    crud: AppointmentCrud,
}

impl CheckAvailability {
    pub fn new(crud: AppointmentCrud) -> Self {
        Self { crud }
    }
}

#[derive(Deserialize)]
struct DoctorDate {
    doctor_name: String,
    date: String,
}

#[async_trait]
impl Tool for CheckAvailability {
    fn name(&self) -> &str {
        "check_availability"
    }

    fn description(&self) -> &str {
        "Check if a doctor has an appointment on a given date"
    }

    fn parameters(&self) -> Value {
        string_props(&["doctor_name", "date"])
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: DoctorDate = parse_args(self.name(), args)?;
        let crud = self.crud.clone();
        blocking(move || {
            let booked = crud.get_appointments(&Filter::eq([
                ("doctor_name", args.doctor_name),
                ("date", args.date),
            ]))?;
            let result = if booked.is_empty() {
                json!({"available": true})
            } else {
                json!({"available": false, "appointments": booked})
            };
            Ok(result.to_string())
        })
        .await
    }
}

/// Move an appointment document to a new date and time.
pub struct RescheduleAppointment {
    crud: AppointmentCrud,
}

impl RescheduleAppointment {
    pub fn new(crud: AppointmentCrud) -> Self {
        Self { crud }
    }
}

#[derive(Deserialize)]
struct Move {
    patient_name: String,
    doctor_name: String,
    old_date: String,
    old_time: String,
    new_date: String,
    new_time: String,
}

#[async_trait]
impl Tool for RescheduleAppointment {
    fn name(&self) -> &str {
        "reschedule_appointment"
    }

    fn description(&self) -> &str {
        "Reschedule an appointment"
    }

    fn parameters(&self) -> Value {
        string_props(&[
            "patient_name",
            "doctor_name",
            "old_date",
            "old_time",
            "new_date",
            "new_time",
        ])
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: Move = parse_args(self.name(), args)?;
        let crud = self.crud.clone();
        blocking(move || {
            let filter = Filter::eq([
                ("patient_name", args.patient_name),
                ("doctor_name", args.doctor_name),
                ("date", args.old_date),
                ("time", args.old_time),
            ]);
            let mut set = Document::new();
            set.insert("date".to_string(), Value::String(args.new_date));
            set.insert("time".to_string(), Value::String(args.new_time));

            let result = crud.update_appointment(&filter, set)?;
            let reply = if result.modified > 0 {
                json!({"success": true})
            } else {
                json!({"success": false, "message": "No matching appointment to reschedule"})
            };
            Ok(reply.to_string())
        })
        .await
    }
}

/// Delete an appointment document.
pub struct CancelAppointment {
    crud: AppointmentCrud,
}

impl CancelAppointment {
    pub fn new(crud: AppointmentCrud) -> Self {
        Self { crud }
    }
}

#[async_trait]
impl Tool for CancelAppointment {
    fn name(&self) -> &str {
        "cancel_appointment"
    }

    fn description(&self) -> &str {
        "Cancel an existing appointment"
    }

    fn parameters(&self) -> Value {
        string_props(&["patient_name", "doctor_name", "date", "time"])
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let slot: Slot = parse_args(self.name(), args)?;
        let crud = self.crud.clone();
        blocking(move || {
            let result = crud.delete_appointment(&slot.filter())?;
            let reply = if result.deleted > 0 {
                json!({"success": true})
            } else {
                json!({"success": false, "message": "No matching appointment found"})
            };
            Ok(reply.to_string())
        })
        .await
    }
}

/// List doctors, optionally for one specialization.
pub struct ListDoctors {
    crud: AppointmentCrud,
}

impl ListDoctors {
    pub fn new(crud: AppointmentCrud) -> Self {
        Self { crud }
    }
}

#[derive(Deserialize)]
struct Specialization {
    #[serde(default)]
    specialization: Option<String>,
}

#[async_trait]
impl Tool for ListDoctors {
    fn name(&self) -> &str {
        "list_doctors"
    }

    fn description(&self) -> &str {
        "List all doctors, or doctors of a specific specialization"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"specialization": {"type": "string"}}
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: Specialization = parse_args(self.name(), args)?;
        let specialization = args.specialization.filter(|s| !s.is_empty());
        let crud = self.crud.clone();
        blocking(move || {
            let doctors = crud.get_all_doctors(specialization.as_deref())?;
            let reply = match (doctors.is_empty(), specialization) {
                (false, _) => json!({"success": true, "doctors": doctors}),
                (true, Some(spec)) => json!({
                    "success": false,
                    "message": format!("No doctors found for specialization: {}", spec)
                }),
                (true, None) => json!({"success": false, "message": "No doctors found in the database."}),
            };
            Ok(reply.to_string())
        })
        .await
    }
}

/// Free-text search over any collection.
pub struct QueryDatabase {
    crud: AppointmentCrud,
}

impl QueryDatabase {
    pub fn new(crud: AppointmentCrud) -> Self {
        Self { crud }
    }
}

#[derive(Deserialize)]
struct Query {
    collection_name: String,
    #[serde(default)]
    search_text: String,
}

/// Render a value the way the listing shows it.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn format_records(records: &[Document]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let fields: Vec<String> = doc
                .iter()
                .filter(|(k, _)| k.as_str() != ID_FIELD)
                .map(|(k, v)| format!("{}: {}", k, display_value(v)))
                .collect();
            format!("{}. {}", i + 1, fields.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for QueryDatabase {
    fn name(&self) -> &str {
        "query_database"
    }

    fn description(&self) -> &str {
        "Queries any collection in the connected database. collection_name is the collection \
         (e.g. 'doctor_availability', 'appointments'); search_text is matched case-insensitively \
         against every field, and an empty search_text returns all records."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "collection_name": {"type": "string"},
                "search_text": {"type": "string", "default": ""}
            },
            "required": ["collection_name"]
        })
    }

    fn returns_direct(&self) -> bool {
        true
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: Query = parse_args(self.name(), args)?;
        let search = args.search_text.trim().to_string();

        let pattern = if search.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&search)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ToolError::InvalidArguments {
                        tool: self.name().to_string(),
                        reason: e.to_string(),
                    })?,
            )
        };

        let store = self.crud.store().clone();
        blocking(move || {
            let name = args.collection_name;
            if !store.list_collection_names()?.contains(&name) {
                return Ok(format!("❌ Collection '{}' does not exist in database.", name));
            }

            let collection = store.collection(&name);
            let filter = match pattern {
                None => Filter::All,
                Some(pattern) => {
                    let fields = collection
                        .find_one(&Filter::All)?
                        .map(|doc| {
                            doc.keys()
                                .filter(|k| k.as_str() != ID_FIELD)
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default();
                    Filter::AnyField { pattern, fields }
                }
            };

            let records = collection.find(&filter)?;
            if records.is_empty() {
                return Ok(format!(
                    "❌ No records found for search: '{}' in '{}'.",
                    args.search_text, name
                ));
            }
            Ok(format_records(&records))
        })
        .await
    }
}
