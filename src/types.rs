//! Core types for clinic-assistant.
//!
//! This module defines the records the tools operate on: availability slots
//! read from the slot file and appointments kept in the document store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Doctors the availability-by-doctor tool accepts.
pub const KNOWN_DOCTORS: [&str; 10] = [
    "kevin anderson",
    "robert martinez",
    "susan davis",
    "daniel miller",
    "sarah wilson",
    "michael green",
    "lisa brown",
    "jane smith",
    "emily johnson",
    "john doe",
];

/// One doctor/date/time availability record.
///
/// `date_slot` packs the date and the time into one string
/// (`DD-MM-YYYY HH:MM`). It is both the lookup key and the booking target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    /// Doctor's name as stored.
    pub doctor_name: String,

    /// Free-text specialization.
    pub specialization: String,

    /// Composite date and time string.
    pub date_slot: String,

    /// Whether the slot can still be booked.
    pub is_available: bool,
}

impl AvailabilitySlot {
    /// Create a new slot.
    pub fn new(doctor_name: &str, specialization: &str, date_slot: &str, is_available: bool) -> Self {
        Self {
            doctor_name: doctor_name.to_string(),
            specialization: specialization.to_string(),
            date_slot: date_slot.to_string(),
            is_available,
        }
    }

    /// Text before the first space of `date_slot`.
    pub fn date_part(&self) -> &str {
        self.date_slot.split(' ').next().unwrap_or_default()
    }

    /// Text after the last space of `date_slot`.
    pub fn time_part(&self) -> &str {
        self.date_slot.rsplit(' ').next().unwrap_or_default()
    }
}

/// Status of a stored appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Booked,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "booked"),
        }
    }
}

/// An appointment document.
///
/// Appointments live in their own collection and are independent of the
/// availability slots; booking one does not flip any slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub patient_name: String,
    pub doctor_name: String,
    pub date: String,
    pub time: String,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Create a freshly booked appointment.
    pub fn booked(patient_name: &str, doctor_name: &str, date: &str, time: &str) -> Self {
        Self {
            patient_name: patient_name.to_string(),
            doctor_name: doctor_name.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            status: AppointmentStatus::Booked,
        }
    }
}
