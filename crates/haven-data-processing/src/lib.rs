//! Raw table ingestion for the Haven shelter directory.
//!
//! This crate turns a loosely-structured shelter listing into typed
//! [`ShelterRecord`]s:
//!
//! 1. [`fetch_raw_table`] obtains the listing from a file, from memory, or over
//!    HTTP (`download_data` feature) and decodes it into [`RawRow`]s.
//! 2. [`reassemble`] merges each header row with the continuation rows that carry
//!    its address and phone number.
//!
//! Geocoding, the directory store and querying live in the `haven` crate.
//!
//! ```rust
//! use haven_data_processing::{reassemble, test_data::scenario_rows};
//!
//! let records = reassemble(&scenario_rows());
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].address, "123 Main St");
//! ```

mod error;
pub mod raw;
pub mod reassemble;
pub mod record;
pub mod test_data;

pub use error::{DataError, Result};
pub use raw::{RawRow, TableOptions, TableSource, decode_table, fetch_raw_table};
pub use reassemble::{
    ColumnLayout, HeaderFields, Reassembler, is_phone_line, reassemble, reassemble_with_layout,
};
pub use record::{BedCapacity, BedCount, Coordinates, ShelterId, ShelterKind, ShelterRecord};
pub use test_data::{TestTableConfig, create_test_table};
