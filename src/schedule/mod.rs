//! Appointment-slot availability and booking.
//!
//! Every operation reads the sheet fresh from disk. Mutations go through
//! [`CsvSlotStore::update`], so the read-modify-write is serialized within
//! the process and the file is only rewritten on success.

pub mod availability;
pub mod booking;
pub mod datetime;

use std::sync::Arc;

pub use booking::BookingOutcome;

use crate::error::StoreError;
use crate::store::{CsvSlotStore, Edit};

/// Slot operations over one availability sheet.
#[derive(Debug, Clone)]
pub struct SlotService {
    store: Arc<CsvSlotStore>,
}

impl SlotService {
    pub fn new(store: Arc<CsvSlotStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CsvSlotStore {
        &self.store
    }

    pub fn availability_by_doctor(&self, date: &str, doctor: &str) -> Result<String, StoreError> {
        let slots = self.store.load()?.slots()?;
        Ok(availability::by_doctor(&slots, date, doctor))
    }

    pub fn availability_by_specialization(
        &self,
        date: &str,
        specialization: &str,
    ) -> Result<String, StoreError> {
        let slots = self.store.load()?.slots()?;
        Ok(availability::by_specialization(&slots, date, specialization))
    }

    /// Book a slot; the sheet is written back only when a slot was taken.
    pub fn set_appointment(&self, desired: &str, doctor: &str) -> Result<BookingOutcome, StoreError> {
        self.store.update(|sheet| booking::book(sheet, desired, doctor))
    }

    /// Acknowledge an appointment. The sheet is rewritten as is.
    pub fn confirm_appointment(&self, desired: &str, doctor: &str) -> Result<String, StoreError> {
        self.store.update(|_| Ok(Edit::Write(())))?;
        Ok(format!("✅ Appointment confirmed with {} on {}.", doctor, desired))
    }

    /// Book the new slot. The old one stays taken.
    pub fn reschedule_appointment(
        &self,
        old: &str,
        new: &str,
        doctor: &str,
    ) -> Result<BookingOutcome, StoreError> {
        tracing::debug!("Rescheduling {} from {} to {}", doctor, old, new);
        self.set_appointment(new, doctor)
    }
}
