//! Tools over the availability sheet.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{blocking, parse_args, Tool};
use crate::error::ToolError;
use crate::schedule::{datetime, SlotService};
use crate::types::KNOWN_DOCTORS;

fn invalid(tool: &str, reason: String) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason,
    }
}

/// `desired_date` + `doctor_name` schema shared by the booking tools.
fn date_and_doctor_schema(date_hint: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "desired_date": {"type": "string", "description": date_hint},
            "doctor_name": {"type": "string", "description": "Doctor's full name"}
        },
        "required": ["desired_date", "doctor_name"]
    })
}

#[derive(Deserialize)]
struct DateAndDoctor {
    desired_date: String,
    doctor_name: String,
}

/// Free times of one doctor on one day.
pub struct CheckAvailabilityByDoctor {
    slots: SlotService,
}

impl CheckAvailabilityByDoctor {
    pub fn new(slots: SlotService) -> Self {
        Self { slots }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityByDoctor {
    fn name(&self) -> &str {
        "check_availability_by_doctor"
    }

    fn description(&self) -> &str {
        "Check availability for a specific doctor on a specific date."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "desired_date": {
                    "type": "string",
                    "description": "Date in DD-MM-YYYY format",
                    "pattern": r"^\d{2}-\d{2}-\d{4}$"
                },
                "doctor_name": {"type": "string", "enum": KNOWN_DOCTORS}
            },
            "required": ["desired_date", "doctor_name"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: DateAndDoctor = parse_args(self.name(), args)?;

        if !datetime::is_date_only(&args.desired_date) {
            return Err(invalid(
                self.name(),
                format!("desired_date '{}' must be DD-MM-YYYY", args.desired_date),
            ));
        }
        if !KNOWN_DOCTORS.contains(&args.doctor_name.as_str()) {
            return Err(invalid(
                self.name(),
                format!(
                    "doctor_name '{}' must be one of: {}",
                    args.doctor_name,
                    KNOWN_DOCTORS.join(", ")
                ),
            ));
        }

        let slots = self.slots.clone();
        blocking(move || Ok(slots.availability_by_doctor(&args.desired_date, &args.doctor_name)?)).await
    }
}

/// Free times of every doctor in a specialization on one day.
pub struct CheckAvailabilityBySpecialization {
    slots: SlotService,
}

impl CheckAvailabilityBySpecialization {
    pub fn new(slots: SlotService) -> Self {
        Self { slots }
    }
}

#[derive(Deserialize)]
struct DateAndSpecialization {
    desired_date: String,
    specialization: String,
}

#[async_trait]
impl Tool for CheckAvailabilityBySpecialization {
    fn name(&self) -> &str {
        "check_availability_by_specialization"
    }

    fn description(&self) -> &str {
        "Check availability for a specialization on a specific date (flexible input)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "desired_date": {"type": "string", "description": "Date, preferably DD-MM-YYYY"},
                "specialization": {"type": "string", "description": "e.g. general_dentist, orthodontist"}
            },
            "required": ["desired_date", "specialization"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: DateAndSpecialization = parse_args(self.name(), args)?;
        let slots = self.slots.clone();
        blocking(move || {
            Ok(slots.availability_by_specialization(&args.desired_date, &args.specialization)?)
        })
        .await
    }
}

/// Take a slot.
pub struct SetAppointment {
    slots: SlotService,
}

impl SetAppointment {
    pub fn new(slots: SlotService) -> Self {
        Self { slots }
    }
}

#[async_trait]
impl Tool for SetAppointment {
    fn name(&self) -> &str {
        "set_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment for the given date and doctor. Accepts just 'DD-MM-YYYY' or \
         'DD-MM-YYYY HH:MM'. If only date is given, picks the first available slot."
    }

    fn parameters(&self) -> Value {
        date_and_doctor_schema("'DD-MM-YYYY' or 'DD-MM-YYYY HH:MM'")
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: DateAndDoctor = parse_args(self.name(), args)?;
        let slots = self.slots.clone();
        blocking(move || {
            Ok(slots
                .set_appointment(&args.desired_date, &args.doctor_name)?
                .to_string())
        })
        .await
    }
}

/// Acknowledge a booking.
pub struct ConfirmAppointment {
    slots: SlotService,
}

impl ConfirmAppointment {
    pub fn new(slots: SlotService) -> Self {
        Self { slots }
    }
}

#[async_trait]
impl Tool for ConfirmAppointment {
    fn name(&self) -> &str {
        "confirm_appointment"
    }

    fn description(&self) -> &str {
        "Confirms an appointment if available."
    }

    fn parameters(&self) -> Value {
        date_and_doctor_schema("Appointment date and time")
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: DateAndDoctor = parse_args(self.name(), args)?;
        let slots = self.slots.clone();
        blocking(move || Ok(slots.confirm_appointment(&args.desired_date, &args.doctor_name)?)).await
    }
}

/// Move a booking to a new slot.
pub struct RescheduleSlot {
    slots: SlotService,
}

impl RescheduleSlot {
    pub fn new(slots: SlotService) -> Self {
        Self { slots }
    }
}

#[derive(Deserialize)]
struct Reschedule {
    old_date: String,
    new_date: String,
    doctor_name: String,
}

#[async_trait]
impl Tool for RescheduleSlot {
    fn name(&self) -> &str {
        "reschedule_appointment"
    }

    fn description(&self) -> &str {
        "Reschedule an appointment."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "old_date": {"type": "string", "description": "Current appointment, 'DD-MM-YYYY HH:MM'"},
                "new_date": {"type": "string", "description": "'DD-MM-YYYY' or 'DD-MM-YYYY HH:MM'"},
                "doctor_name": {"type": "string"}
            },
            "required": ["old_date", "new_date", "doctor_name"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let args: Reschedule = parse_args(self.name(), args)?;
        let slots = self.slots.clone();
        blocking(move || {
            Ok(slots
                .reschedule_appointment(&args.old_date, &args.new_date, &args.doctor_name)?
                .to_string())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CsvSlotStore;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    const SHEET: &str = "\
date_slot,specialization,doctor_name,is_available
05-08-2024 08:00,general_dentist,john doe,True
05-08-2024 08:30,general_dentist,john doe,True
";

    fn service() -> (TempDir, SlotService) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doctor_availability.csv");
        std::fs::write(&path, SHEET).unwrap();
        (dir, SlotService::new(Arc::new(CsvSlotStore::new(path))))
    }

    #[tokio::test]
    async fn test_doctor_lookup_validates_inputs() {
        let (_dir, slots) = service();
        let tool = CheckAvailabilityByDoctor::new(slots);

        let err = tool
            .call(json!({"desired_date": "5-8-2024", "doctor_name": "john doe"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be DD-MM-YYYY"));

        let err = tool
            .call(json!({"desired_date": "05-08-2024", "doctor_name": "dr who"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be one of"));

        let ok = tool
            .call(json!({"desired_date": "05-08-2024", "doctor_name": "john doe"}))
            .await
            .unwrap();
        assert_eq!(ok, "Availability for 05-08-2024\nAvailable slots: 08:00, 08:30");
    }

    #[tokio::test]
    async fn test_set_appointment_then_lookup() {
        let (_dir, slots) = service();
        let book = SetAppointment::new(slots.clone());
        let lookup = CheckAvailabilityBySpecialization::new(slots);

        let reply = book
            .call(json!({"desired_date": "05-08-2024", "doctor_name": "john doe"}))
            .await
            .unwrap();
        assert_eq!(reply, "✅ Appointment confirmed with john doe on 05-08-2024 08:00.");

        let after = lookup
            .call(json!({"desired_date": "05-08-2024", "specialization": "general_dentist"}))
            .await
            .unwrap();
        assert_eq!(after, "Availability for 05-08-2024\njohn doe - Available slots: \n8:30 AM\n");
    }

    #[tokio::test]
    async fn test_reschedule_books_new_slot() {
        let (_dir, slots) = service();
        let tool = RescheduleSlot::new(slots);
        let reply = tool
            .call(json!({
                "old_date": "05-08-2024 08:00",
                "new_date": "05-08-2024 08:30",
                "doctor_name": "john doe"
            }))
            .await
            .unwrap();
        assert_eq!(reply, "✅ Appointment confirmed with john doe on 05-08-2024 08:30.");
    }

    #[tokio::test]
    async fn test_missing_file_surfaces_as_error() {
        let dir = tempdir().unwrap();
        let slots = SlotService::new(Arc::new(CsvSlotStore::new(dir.path().join("none.csv"))));
        let err = ConfirmAppointment::new(slots)
            .call(json!({"desired_date": "05-08-2024", "doctor_name": "john doe"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Store(_)));
    }

    #[test]
    fn test_doctor_schema_lists_known_doctors() {
        let (_dir, slots) = service();
        let schema = CheckAvailabilityByDoctor::new(slots).parameters();
        assert_eq!(schema["properties"]["doctor_name"]["enum"].as_array().unwrap().len(), 10);
    }
}
