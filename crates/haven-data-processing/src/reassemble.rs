//! Record reassembly: merge a header row and its continuation rows into one record.
//!
//! The listing stores each shelter as a header row (name and city filled in)
//! followed by zero or more continuation rows whose first cell carries either an
//! address line or a phone number. The [`Reassembler`] is a two-state machine
//! over that convention:
//!
//! - **Idle**: no record in progress. Non-header rows are ignored.
//! - **Accumulating**: a header has been seen; continuation rows extend it.
//!
//! Malformed rows never produce errors. They are absorbed by the rules above.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, trace};

use crate::{
    raw::RawRow,
    record::{BedCapacity, ShelterId, ShelterRecord},
};

/// Leading run of digits and separators (`-`, `.`, space, parentheses) with an
/// optional `+`. Only the start of the cell has to match.
static PHONE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[\d\s().-]+").expect("phone pattern is a valid regex")
});

const MIN_PHONE_DIGITS: usize = 10;

const ADDRESS_SEPARATOR: &str = ", ";

/// Returns true when `cell` starts with a phone number of at least ten digits.
#[must_use]
pub fn is_phone_line(cell: &str) -> bool {
    PHONE_PREFIX.find(cell.trim()).is_some_and(|prefix| {
        prefix.as_str().chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
    })
}

/// Column positions of the listing. The only place that knows the table layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub name: usize,
    pub city: usize,
    pub demographic_scope: usize,
    pub age_range: usize,
    pub bed_capacity: usize,
    pub note: usize,
    pub intake_info: usize,
    pub services: usize,
    pub category: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            name: 0,
            city: 1,
            demographic_scope: 2,
            age_range: 3,
            bed_capacity: 4,
            note: 5,
            intake_info: 6,
            services: 7,
            category: 8,
        }
    }
}

/// Named view of a header row's fixed-position fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub name: String,
    pub city: String,
    pub demographic_scope: String,
    pub age_range: String,
    pub bed_capacity: String,
    pub note: String,
    pub intake_info: String,
    pub services: String,
    pub category: String,
}

impl ColumnLayout {
    /// A header row has both of its first two fields (name and city) filled in.
    #[must_use]
    pub fn is_header(&self, row: &RawRow) -> bool {
        !row.field(self.name).is_empty() && !row.field(self.city).is_empty()
    }

    #[must_use]
    pub fn header_fields(&self, row: &RawRow) -> HeaderFields {
        let field = |idx: usize| row.field(idx).to_string();
        HeaderFields {
            name: field(self.name),
            city: field(self.city),
            demographic_scope: field(self.demographic_scope),
            age_range: field(self.age_range),
            bed_capacity: field(self.bed_capacity),
            note: field(self.note),
            intake_info: field(self.intake_info),
            services: field(self.services),
            category: field(self.category),
        }
    }

    /// The cell continuation rows use for address and phone lines.
    #[must_use]
    pub fn continuation_cell<'a>(&self, row: &'a RawRow) -> &'a str {
        row.field(self.name)
    }
}

/// A record whose continuation block is still open.
#[derive(Debug)]
struct PendingRecord {
    header: HeaderFields,
    address_lines: Vec<String>,
    phone: Option<String>,
    notes: Vec<String>,
    intake_lines: Vec<String>,
}

impl PendingRecord {
    fn open(header: HeaderFields) -> Self {
        let notes = non_empty(&header.note);
        let intake_lines = non_empty(&header.intake_info);
        Self {
            header,
            address_lines: Vec::new(),
            phone: None,
            notes,
            intake_lines,
        }
    }

    fn absorb(&mut self, row: &RawRow, layout: &ColumnLayout) {
        let cell = layout.continuation_cell(row);
        if is_phone_line(cell) {
            // Last phone line in the block wins.
            self.phone = Some(cell.trim().to_string());
        } else if !cell.is_empty() {
            self.address_lines.push(cell.to_string());
        }

        self.notes.extend(non_empty(row.field(layout.note)));
        self.intake_lines
            .extend(non_empty(row.field(layout.intake_info)));
    }

    fn finalize(self) -> ShelterRecord {
        let HeaderFields {
            name,
            city,
            demographic_scope,
            age_range,
            bed_capacity,
            services,
            category,
            ..
        } = self.header;
        let address = self.address_lines.join(ADDRESS_SEPARATOR);

        ShelterRecord {
            id: ShelterId::from_parts(&name, &address),
            name,
            city,
            demographic_scope,
            age_range,
            bed_capacity: BedCapacity::parse(&bed_capacity),
            category,
            address,
            phone: self.phone,
            note: self.notes.iter().join(" "),
            intake_info: self.intake_lines.iter().join(" "),
            services,
            coordinates: None,
        }
    }
}

fn non_empty(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        Vec::new()
    } else {
        vec![cell.to_string()]
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Accumulating(PendingRecord),
}

/// Incremental reassembler. Feed rows with [`Reassembler::push`], then call
/// [`Reassembler::finish`].
#[derive(Debug, Default)]
pub struct Reassembler {
    layout: ColumnLayout,
    state: State,
    records: Vec<ShelterRecord>,
    ignored_rows: usize,
    dropped_records: usize,
}

impl Reassembler {
    #[must_use]
    pub fn new(layout: ColumnLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn push(&mut self, row: &RawRow) {
        if self.layout.is_header(row) {
            self.close_pending();
            self.state = State::Accumulating(PendingRecord::open(self.layout.header_fields(row)));
            return;
        }

        match &mut self.state {
            State::Accumulating(pending) => pending.absorb(row, &self.layout),
            State::Idle => {
                trace!(fields = ?row.fields(), "Ignoring row outside of a record block");
                self.ignored_rows += 1;
            }
        }
    }

    /// Closes any open record and returns all records in source order.
    #[must_use]
    pub fn finish(mut self) -> Vec<ShelterRecord> {
        self.close_pending();
        debug!(
            records = self.records.len(),
            ignored_rows = self.ignored_rows,
            dropped_records = self.dropped_records,
            "Reassembly finished"
        );
        self.records
    }

    fn close_pending(&mut self) {
        if let State::Accumulating(pending) = std::mem::take(&mut self.state) {
            let record = pending.finalize();
            if record.name.trim().is_empty() {
                self.dropped_records += 1;
            } else {
                self.records.push(record);
            }
        }
    }
}

/// Reassemble rows using the default column layout.
#[must_use]
pub fn reassemble(rows: &[RawRow]) -> Vec<ShelterRecord> {
    reassemble_with_layout(rows, &ColumnLayout::default())
}

#[instrument(name = "Reassemble records", skip_all, fields(rows = rows.len()), level = "info")]
#[must_use]
pub fn reassemble_with_layout(rows: &[RawRow], layout: &ColumnLayout) -> Vec<ShelterRecord> {
    let mut reassembler = Reassembler::new(layout.clone());
    for row in rows {
        reassembler.push(row);
    }
    reassembler.finish()
}
