//! Flat-file slot store.
//!
//! The availability sheet is read whole, edited in memory and written back
//! whole. Columns other than the four the slot model knows about are kept
//! as they are, in their original order.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use csv::StringRecord;

use crate::error::StoreError;
use crate::types::AvailabilitySlot;

const DOCTOR_NAME: &str = "doctor_name";
const SPECIALIZATION: &str = "specialization";
const DATE_SLOT: &str = "date_slot";
const IS_AVAILABLE: &str = "is_available";

/// Positions of the known columns within a row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    doctor_name: usize,
    specialization: usize,
    date_slot: usize,
    is_available: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, StoreError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| StoreError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            doctor_name: find(DOCTOR_NAME)?,
            specialization: find(SPECIALIZATION)?,
            date_slot: find(DATE_SLOT)?,
            is_available: find(IS_AVAILABLE)?,
        })
    }
}

/// Parse an availability cell the way spreadsheet exports spell booleans.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Render a flag the way the sheet stores it.
pub fn render_flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// In-memory copy of the availability sheet.
#[derive(Debug, Clone)]
pub struct SlotSheet {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    columns: Columns,
}

impl SlotSheet {
    /// Read a sheet from CSV text with a header row.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, StoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let columns = Columns::locate(&headers)?;

        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?);
        }

        Ok(Self {
            headers,
            rows,
            columns,
        })
    }

    /// Write the sheet back out as CSV, header first.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), StoreError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Header names in file order.
    pub fn headers(&self) -> Vec<String> {
        self.headers.iter().map(String::from).collect()
    }

    /// Raw cells of a row.
    pub fn raw_row(&self, index: usize) -> Option<Vec<String>> {
        self.rows
            .get(index)
            .map(|row| row.iter().map(String::from).collect())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the sheet has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decode one row into a slot.
    ///
    /// An unreadable availability cell counts as not available.
    pub fn slot(&self, index: usize) -> Result<AvailabilitySlot, StoreError> {
        let row = self.rows.get(index).ok_or_else(|| StoreError::InvalidValue {
            row: index,
            column: DATE_SLOT.to_string(),
            value: "<missing row>".to_string(),
        })?;
        let cell = |i: usize| row.get(i).unwrap_or_default().to_string();

        let flag = cell(self.columns.is_available);
        let is_available = parse_flag(&flag).unwrap_or_else(|| {
            tracing::warn!(
                "Row {}: unreadable {} value '{}', treating slot as taken",
                index,
                IS_AVAILABLE,
                flag
            );
            false
        });

        Ok(AvailabilitySlot {
            doctor_name: cell(self.columns.doctor_name),
            specialization: cell(self.columns.specialization),
            date_slot: cell(self.columns.date_slot),
            is_available,
        })
    }

    /// Decode every row, in file order.
    pub fn slots(&self) -> Result<Vec<AvailabilitySlot>, StoreError> {
        (0..self.rows.len()).map(|i| self.slot(i)).collect()
    }

    /// Overwrite the availability flag of a row.
    pub fn set_available(&mut self, index: usize, available: bool) {
        let column = self.columns.is_available;
        if let Some(row) = self.rows.get_mut(index) {
            let mut cells: Vec<String> = row.iter().map(String::from).collect();
            if let Some(cell) = cells.get_mut(column) {
                *cell = render_flag(available).to_string();
            }
            *row = StringRecord::from(cells);
        }
    }
}

/// Outcome of an edit: whether the sheet must be written back.
#[derive(Debug)]
pub enum Edit<T> {
    /// Leave the file untouched.
    Keep(T),
    /// Persist the edited sheet.
    Write(T),
}

/// Slot store backed by a CSV file.
///
/// Edits within one process are serialized, and the file is replaced
/// through a temporary file in the same directory.
#[derive(Debug)]
pub struct CsvSlotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvSlotStore {
    /// Create a store for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole sheet.
    pub fn load(&self) -> Result<SlotSheet, StoreError> {
        let file = std::fs::File::open(&self.path)?;
        SlotSheet::from_reader(io::BufReader::new(file))
    }

    /// Read, edit and (if asked to) rewrite the sheet under the store lock.
    pub fn update<T, F>(&self, edit: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SlotSheet) -> Result<Edit<T>, StoreError>,
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let mut sheet = self.load()?;
        match edit(&mut sheet)? {
            Edit::Keep(value) => Ok(value),
            Edit::Write(value) => {
                self.save(&sheet)?;
                Ok(value)
            }
        }
    }

    fn save(&self, sheet: &SlotSheet) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        sheet.write_to(&mut tmp)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!("Rewrote {} ({} rows)", self.path.display(), sheet.len());
        Ok(())
    }
}
