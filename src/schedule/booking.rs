//! Booking against the availability sheet.

use std::fmt;

use super::datetime::{is_date_only, parse_date_time, slot_label, slot_prefix};
use crate::error::StoreError;
use crate::store::{Edit, SlotSheet};

/// Result of a booking attempt, rendered as the message the model sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    /// Date-only request with nothing free that day.
    NoSlotsOnDate { doctor: String, date: String },
    /// Input is neither `DD-MM-YYYY` nor `DD-MM-YYYY HH:MM`.
    InvalidFormat,
    /// Nothing free at the requested slot.
    Unavailable { doctor: String, target: String },
    /// The slot was taken.
    Confirmed { doctor: String, target: String },
}

impl BookingOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, BookingOutcome::Confirmed { .. })
    }
}

impl fmt::Display for BookingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingOutcome::NoSlotsOnDate { doctor, date } => {
                write!(f, "❌ No available slots for {} on {}.", doctor, date)
            }
            BookingOutcome::InvalidFormat => write!(
                f,
                "❌ Invalid date format. Please use 'DD-MM-YYYY' or 'DD-MM-YYYY HH:MM'."
            ),
            BookingOutcome::Unavailable { doctor, target } => write!(
                f,
                "❌ Slot with {} at {} is already booked or unavailable.",
                doctor, target
            ),
            BookingOutcome::Confirmed { doctor, target } => {
                write!(f, "✅ Appointment confirmed with {} on {}.", doctor, target)
            }
        }
    }
}

/// Book `doctor` at `desired` (a date, or a date and time).
///
/// A bare date takes the doctor's first free slot of that day in sheet
/// order. A date and time is matched as text against the first
/// [`SLOT_PREFIX_LEN`](super::datetime::SLOT_PREFIX_LEN) characters of
/// each slot, so `08:30` and `8:30` are different slots. Every row sharing
/// the prefix and doctor is marked taken.
pub fn book(sheet: &mut SlotSheet, desired: &str, doctor: &str) -> Result<Edit<BookingOutcome>, StoreError> {
    let input = desired.trim();
    let doctor_key = doctor.to_lowercase();
    let slots = sheet.slots()?;

    let target = if is_date_only(input) {
        let first = slots.iter().find(|s| {
            s.is_available && s.doctor_name.to_lowercase() == doctor_key && s.date_slot.starts_with(input)
        });
        match first {
            Some(slot) => slot.date_slot.clone(),
            None => {
                return Ok(Edit::Keep(BookingOutcome::NoSlotsOnDate {
                    doctor: doctor.to_string(),
                    date: input.to_string(),
                }))
            }
        }
    } else {
        match parse_date_time(input) {
            Some(at) => {
                tracing::debug!("Booking request for slot {}", slot_label(&at));
                input.to_string()
            }
            None => return Ok(Edit::Keep(BookingOutcome::InvalidFormat)),
        }
    };

    let prefix = slot_prefix(&target);
    let matching: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.date_slot.starts_with(prefix) && s.doctor_name.to_lowercase() == doctor_key)
        .map(|(i, _)| i)
        .collect();

    if !matching.iter().any(|&i| slots[i].is_available) {
        return Ok(Edit::Keep(BookingOutcome::Unavailable {
            doctor: doctor.to_string(),
            target,
        }));
    }

    for &i in &matching {
        sheet.set_available(i, false);
    }
    tracing::info!("Booked {} at {} ({} rows)", doctor, target, matching.len());

    Ok(Edit::Write(BookingOutcome::Confirmed {
        doctor: doctor.to_string(),
        target,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
date_slot,specialization,doctor_name,is_available
05-08-2024 08:00,general_dentist,john doe,False
05-08-2024 08:30,general_dentist,john doe,True
05-08-2024 09:00,general_dentist,john doe,True
05-08-2024 8:30,general_dentist,emily johnson,True
";

    fn sheet() -> SlotSheet {
        SlotSheet::from_reader(SHEET.as_bytes()).unwrap()
    }

    fn written(edit: Edit<BookingOutcome>) -> BookingOutcome {
        match edit {
            Edit::Write(outcome) => outcome,
            Edit::Keep(outcome) => panic!("expected a write, got {:?}", outcome),
        }
    }

    fn kept(edit: Edit<BookingOutcome>) -> BookingOutcome {
        match edit {
            Edit::Keep(outcome) => outcome,
            Edit::Write(outcome) => panic!("expected no write, got {:?}", outcome),
        }
    }

    #[test]
    fn test_date_only_takes_first_free_slot() {
        let mut sheet = sheet();
        let outcome = written(book(&mut sheet, " 05-08-2024 ", "John Doe").unwrap());

        assert_eq!(
            outcome.to_string(),
            "✅ Appointment confirmed with John Doe on 05-08-2024 08:30."
        );
        let slots = sheet.slots().unwrap();
        assert!(!slots[1].is_available);
        assert!(slots[2].is_available);
    }

    #[test]
    fn test_date_only_with_nothing_free() {
        let mut sheet = sheet();
        let outcome = kept(book(&mut sheet, "06-08-2024", "john doe").unwrap());
        assert_eq!(
            outcome.to_string(),
            "❌ No available slots for john doe on 06-08-2024."
        );
    }

    #[test]
    fn test_exact_slot_is_booked() {
        let mut sheet = sheet();
        let outcome = written(book(&mut sheet, "05-08-2024 09:00", "john doe").unwrap());
        assert!(outcome.is_confirmed());
        assert!(!sheet.slots().unwrap()[2].is_available);
    }

    #[test]
    fn test_taken_slot_is_refused() {
        let mut sheet = sheet();
        let outcome = kept(book(&mut sheet, "05-08-2024 08:00", "john doe").unwrap());
        assert_eq!(
            outcome.to_string(),
            "❌ Slot with john doe at 05-08-2024 08:00 is already booked or unavailable."
        );
    }

    #[test]
    fn test_bad_format_is_refused() {
        let mut sheet = sheet();
        for input in ["tomorrow", "05-08-2024 8am", "2024-08-05 08:30"] {
            let outcome = kept(book(&mut sheet, input, "john doe").unwrap());
            assert_eq!(outcome, BookingOutcome::InvalidFormat);
        }
    }

    #[test]
    fn test_zero_padded_time_does_not_match_unpadded_slot() {
        let mut sheet = sheet();
        let outcome = kept(book(&mut sheet, "05-08-2024 08:30", "emily johnson").unwrap());
        assert!(matches!(outcome, BookingOutcome::Unavailable { .. }));
    }

    const CROWDED: &str = "\
date_slot,specialization,doctor_name,is_available
05-08-2024 10:00,general_dentist,john doe,False
05-08-2024 10:00,general_dentist,john doe,True
05-08-2024 10:00:00,general_dentist,John Doe,True
05-08-2024 10:00,orthodontist,emily johnson,True
05-08-2024 11:00:00,general_dentist,john doe,True
";

    #[test]
    fn test_every_row_sharing_prefix_and_doctor_is_taken() {
        let mut sheet = SlotSheet::from_reader(CROWDED.as_bytes()).unwrap();
        let outcome = written(book(&mut sheet, "05-08-2024 10:00", "john doe").unwrap());
        assert!(outcome.is_confirmed());

        let flags: Vec<bool> = sheet.slots().unwrap().iter().map(|s| s.is_available).collect();
        assert_eq!(flags, vec![false, false, false, true, true]);
    }

    #[test]
    fn test_prefix_matches_slots_with_seconds() {
        let mut sheet = SlotSheet::from_reader(CROWDED.as_bytes()).unwrap();
        let outcome = written(book(&mut sheet, "05-08-2024 11:00", "john doe").unwrap());
        assert_eq!(
            outcome.to_string(),
            "✅ Appointment confirmed with john doe on 05-08-2024 11:00."
        );
        assert!(!sheet.slots().unwrap()[4].is_available);

        let outcome = kept(book(&mut sheet, "05-08-2024 11:00", "john doe").unwrap());
        assert!(matches!(outcome, BookingOutcome::Unavailable { .. }));
    }

    #[test]
    fn test_date_only_target_is_full_stored_slot() {
        let text = "date_slot,specialization,doctor_name,is_available\n\
                    06-08-2024 14:30:00,general_dentist,john doe,True\n";
        let mut sheet = SlotSheet::from_reader(text.as_bytes()).unwrap();
        let outcome = written(book(&mut sheet, "06-08-2024", "john doe").unwrap());
        assert_eq!(
            outcome.to_string(),
            "✅ Appointment confirmed with john doe on 06-08-2024 14:30:00."
        );
        assert!(!sheet.slots().unwrap()[0].is_available);
    }
}
