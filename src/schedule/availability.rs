//! Availability queries over a set of slots.

use std::collections::BTreeMap;

use super::datetime::{normalize_date, to_am_pm};
use crate::types::AvailabilitySlot;

/// Message when a doctor has nothing free on the day.
pub const NO_AVAILABILITY_TODAY: &str = "No availability in the entire day";

/// Free times for one doctor on one date, in sheet order.
pub fn by_doctor(slots: &[AvailabilitySlot], date: &str, doctor: &str) -> String {
    let times: Vec<&str> = slots
        .iter()
        .filter(|s| s.is_available && s.date_part() == date && s.doctor_name == doctor)
        .map(AvailabilitySlot::time_part)
        .collect();

    if times.is_empty() {
        return NO_AVAILABILITY_TODAY.to_string();
    }
    format!("Availability for {}\nAvailable slots: {}", date, times.join(", "))
}

/// Free times for every doctor of a specialization, grouped per doctor.
pub fn by_specialization(slots: &[AvailabilitySlot], date: &str, specialization: &str) -> String {
    let date = normalize_date(date);
    let wanted = specialization.to_lowercase();

    let mut groups: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
    for slot in slots.iter().filter(|s| {
        s.is_available && s.date_part() == date && s.specialization.to_lowercase() == wanted
    }) {
        groups
            .entry((slot.specialization.as_str(), slot.doctor_name.as_str()))
            .or_default()
            .push(slot.time_part());
    }

    if groups.is_empty() {
        return format!("No availability for {} on {}.", specialization, date);
    }

    let mut output = format!("Availability for {}\n", date);
    for ((_, doctor), times) in groups {
        let rendered: Vec<String> = times
            .into_iter()
            .map(|t| to_am_pm(t).unwrap_or_else(|| t.to_string()))
            .collect();
        output.push_str(&format!(
            "{} - Available slots: \n{}\n",
            doctor,
            rendered.join(", \n")
        ));
    }
    output
}
