use std::fmt::Write as _;
use std::io::Write;

use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;
use crate::raw::RawRow;

/// Column titles written above generated tables.
pub const TITLE_ROWS: [&str; 2] = [
    "Shelter listing,,,,,,,,",
    "Name,City,Gender,Age Range,Beds,Note,Intake,Services,Type",
];

/// The two-record listing used throughout the documentation and tests.
pub const SCENARIO_TABLE: &str = "\
Hope House,Springfield,Women,18+,12,,,,24 Hour Shelter
123 Main St,,,,,,,,
555-123-4567,,,,,,,,
Youth Haven,Lakeview,Youth,16-18,8,,,,Seasonal
456 Oak Ave,,,,,,,,
";

/// Rows of [`SCENARIO_TABLE`], without title rows.
#[must_use]
pub fn scenario_rows() -> Vec<RawRow> {
    SCENARIO_TABLE
        .lines()
        .map(|line| line.split(',').collect())
        .collect()
}

/// Configuration for generated listings
#[derive(Debug, Clone)]
pub struct TestTableConfig {
    /// Number of shelters to write
    pub shelters: usize,
    /// Whether to prepend [`TITLE_ROWS`]
    pub with_titles: bool,
    /// Whether each shelter gets a phone continuation row
    pub with_phones: bool,
}

impl Default for TestTableConfig {
    fn default() -> Self {
        Self {
            shelters: 10,
            with_titles: true,
            with_phones: true,
        }
    }
}

impl TestTableConfig {
    /// Minimal listing for unit tests
    pub fn minimal() -> Self {
        Self {
            shelters: 3,
            with_titles: true,
            with_phones: true,
        }
    }

    /// Larger listing for integration tests
    pub fn sample() -> Self {
        Self {
            shelters: 40,
            ..Self::default()
        }
    }
}

const CITIES: [&str; 4] = ["Springfield", "Lakeview", "Riverside", "Fairview"];
const SCOPES: [&str; 4] = ["Women", "Men", "Families", "Youth"];
const AGES: [&str; 4] = ["18+", "25+", "All ages", "16-18"];
const CATEGORIES: [&str; 4] = ["24 Hour Shelter", "Seasonal", "Lineup", "Youth Shelter"];

/// Build a listing as CSV text.
///
/// Shelter `i` is named `Shelter {i:03}`, lives at `{100 + i} Test St`, and has
/// `i` beds except every fifth shelter, whose capacity is the placeholder `-`.
#[must_use]
pub fn create_test_table_text(config: &TestTableConfig) -> String {
    let mut text = String::new();
    if config.with_titles {
        for title in TITLE_ROWS {
            let _ = writeln!(text, "{title}");
        }
    }

    for i in 0..config.shelters {
        let beds = if i % 5 == 0 {
            "-".to_string()
        } else {
            i.to_string()
        };
        let _ = writeln!(
            text,
            "Shelter {i:03},{},{},{},{beds},,,none,{}",
            CITIES[i % CITIES.len()],
            SCOPES[i % SCOPES.len()],
            AGES[i % AGES.len()],
            CATEGORIES[i % CATEGORIES.len()],
        );
        let _ = writeln!(text, "{} Test St,,,,,,,,", 100 + i);
        if config.with_phones {
            let _ = writeln!(text, "555-010-{:04},,,,,,,,", i % 10_000);
        }
    }
    text
}

/// Write a generated listing to a temporary file.
pub fn create_test_table(config: &TestTableConfig) -> Result<NamedTempFile> {
    info!("Creating test table with config: {:?}", config);

    let mut file = NamedTempFile::with_suffix(".csv")?;
    file.write_all(create_test_table_text(config).as_bytes())?;
    file.flush()?;
    Ok(file)
}
