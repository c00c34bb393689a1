//! Filtering and ordering over a published [`Directory`].

use std::{cmp::Ordering, fmt, str::FromStr};

use haven_data_processing::{Coordinates, ShelterRecord};
use tracing::{debug, instrument};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{
    config::QueryConfigBuilder,
    directory::Directory,
    distance::distance_to,
    error::{HavenError, Result},
};

/// Category filter applied before search and sorting.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Category {
    #[default]
    All,
    /// Category tag contains "24 Hour"
    Emergency,
    /// Age range contains "Youth" or "16-18"
    Youth,
    /// Demographic scope contains "Families"
    Family,
}

impl Category {
    pub const ALL: [Self; 4] = [Self::All, Self::Emergency, Self::Youth, Self::Family];

    #[must_use]
    pub fn matches(self, record: &ShelterRecord) -> bool {
        match self {
            Self::All => true,
            Self::Emergency => record.category.contains("24 Hour"),
            Self::Youth => record.age_range.contains("Youth") || record.age_range.contains("16-18"),
            Self::Family => record.demographic_scope.contains("Families"),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Emergency => "emergency",
            Self::Youth => "youth",
            Self::Family => "family",
        }
    }
}

impl FromStr for Category {
    type Err = HavenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HavenError::ConfigError(format!("Unknown category: {s:?}")))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortBy {
    /// Ascending, ignoring case and accents
    #[default]
    Name,
    /// Ascending from the query's reference location; unresolved records last
    Distance,
    /// Descending bed count; unknown capacity counts as zero
    Capacity,
}

impl SortBy {
    pub const ALL: [Self; 3] = [Self::Name, Self::Distance, Self::Capacity];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Distance => "distance",
            Self::Capacity => "capacity",
        }
    }
}

impl FromStr for SortBy {
    type Err = HavenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|sort| sort.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HavenError::ConfigError(format!("Unknown sort order: {s:?}")))
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for [`query`]. The default lists everything sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConfig {
    pub category: Category,
    /// Matched case-insensitively against name and address; empty matches all
    pub search_text: String,
    pub sort_by: SortBy,
    /// Needed for [`SortBy::Distance`]; without it every distance is undefined
    pub reference: Option<Coordinates>,
}

impl QueryConfig {
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::new()
    }
}

/// Filter and order the directory's records.
///
/// Pure: the directory is only read and the same inputs always give the same
/// ordering. Every sort is stable, so ties keep source order.
#[instrument(name = "Query directory", skip_all, level = "debug")]
pub fn query<'a>(directory: &'a Directory, config: &QueryConfig) -> Vec<&'a ShelterRecord> {
    let needle = config.search_text.to_lowercase();
    let mut results: Vec<&ShelterRecord> = directory
        .iter()
        .filter(|record| config.category.matches(record))
        .filter(|record| matches_search(record, &needle))
        .collect();

    match config.sort_by {
        SortBy::Name => {
            results.sort_by_cached_key(|record| (collation_key(&record.name), record.name.clone()));
        }
        SortBy::Capacity => {
            results.sort_by_key(|record| std::cmp::Reverse(record.bed_capacity.beds()));
        }
        SortBy::Distance => {
            results = sort_by_distance(results, config.reference);
        }
    }

    debug!(
        category = %config.category,
        sort_by = %config.sort_by,
        matched = results.len(),
        total = directory.len(),
        "Query complete"
    );
    results
}

/// Case- and accent-insensitive sort key: canonical decomposition with the
/// combining marks dropped, then lower-cased.
fn collation_key(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn matches_search(record: &ShelterRecord, needle: &str) -> bool {
    needle.is_empty()
        || record.name.to_lowercase().contains(needle)
        || record.address.to_lowercase().contains(needle)
}

fn sort_by_distance(
    records: Vec<&ShelterRecord>,
    reference: Option<Coordinates>,
) -> Vec<&ShelterRecord> {
    let Some(reference) = reference else {
        return records;
    };

    let mut keyed: Vec<(Option<f64>, &ShelterRecord)> = records
        .into_iter()
        .map(|record| (distance_to(record, reference), record))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_distance(*a, *b));
    keyed.into_iter().map(|(_, record)| record).collect()
}

/// Defined distances ascend; undefined ones compare equal to each other and after every defined one.
fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use haven_data_processing::{ShelterId, reassemble, test_data::scenario_rows};

    use super::*;

    const LAKEVIEW: Coordinates = Coordinates::new(41.9400, -87.6600);

    /// Hope House left ungeocoded, Youth Haven resolved.
    fn scenario_directory() -> Directory {
        let mut records = reassemble(&scenario_rows());
        records[1].coordinates = Some(Coordinates::new(41.9430, -87.6540));
        Directory::from_records(records)
    }

    fn names(results: &[&ShelterRecord]) -> Vec<String> {
        results.iter().map(|r| r.name.clone()).collect()
    }

    fn record(name: &str, beds: &str, coordinates: Option<Coordinates>) -> ShelterRecord {
        ShelterRecord {
            id: ShelterId::from_parts(name, ""),
            name: name.to_string(),
            city: String::new(),
            demographic_scope: String::new(),
            age_range: String::new(),
            bed_capacity: haven_data_processing::BedCapacity::parse(beds),
            category: String::new(),
            address: String::new(),
            phone: None,
            note: String::new(),
            intake_info: String::new(),
            services: String::new(),
            coordinates,
        }
    }

    #[test]
    fn test_category_filters() {
        let directory = scenario_directory();

        let emergency = QueryConfig::builder().category(Category::Emergency).build();
        assert_eq!(names(&query(&directory, &emergency)), ["Hope House"]);

        let youth = QueryConfig::builder().category(Category::Youth).build();
        assert_eq!(names(&query(&directory, &youth)), ["Youth Haven"]);

        let family = QueryConfig::builder().category(Category::Family).build();
        assert!(query(&directory, &family).is_empty());

        assert_eq!(query(&directory, &QueryConfig::default()).len(), 2);
    }

    #[test]
    fn test_youth_matches_age_range_text() {
        let mut a = record("A", "1", None);
        a.age_range = "Youth 16-24".to_string();
        let mut b = record("B", "1", None);
        b.age_range = "16-18".to_string();
        let mut c = record("C", "1", None);
        c.age_range = "18+".to_string();
        c.demographic_scope = "Youth".to_string();
        let directory = Directory::from_records(vec![a, b, c]);

        let youth = QueryConfig::builder().category(Category::Youth).build();
        assert_eq!(names(&query(&directory, &youth)), ["A", "B"]);
    }

    #[test]
    fn test_search_is_case_insensitive_over_name_and_address() {
        let directory = scenario_directory();

        let by_name = QueryConfig::builder().search("HOPE").build();
        assert_eq!(names(&query(&directory, &by_name)), ["Hope House"]);

        let by_address = QueryConfig::builder().search("oak ave").build();
        assert_eq!(names(&query(&directory, &by_address)), ["Youth Haven"]);

        let by_city = QueryConfig::builder().search("Lakeview").build();
        assert!(query(&directory, &by_city).is_empty(), "city is not searched");
    }

    #[test]
    fn test_filters_compose_with_and() {
        let directory = scenario_directory();
        let config = QueryConfig::builder()
            .category(Category::Emergency)
            .search("youth")
            .build();
        assert!(query(&directory, &config).is_empty());
    }

    #[test]
    fn test_distance_puts_unresolved_last() {
        let directory = scenario_directory();
        let config = QueryConfig::builder().nearest_to(LAKEVIEW).build();
        assert_eq!(
            names(&query(&directory, &config)),
            ["Youth Haven", "Hope House"]
        );
    }

    #[test]
    fn test_distance_ordering_and_stability() {
        let far = Coordinates::new(10.0, 10.0);
        let near = Coordinates::new(0.1, 0.1);
        let directory = Directory::from_records(vec![
            record("Unresolved 1", "1", None),
            record("Far", "1", Some(far)),
            record("Unresolved 2", "1", None),
            record("Near", "1", Some(near)),
        ]);
        let config = QueryConfig::builder()
            .nearest_to(Coordinates::new(0.0, 0.0))
            .build();
        assert_eq!(
            names(&query(&directory, &config)),
            ["Near", "Far", "Unresolved 1", "Unresolved 2"]
        );
    }

    #[test]
    fn test_distance_without_reference_keeps_source_order() {
        let directory = scenario_directory();
        let config = QueryConfig::builder().sort_by(SortBy::Distance).build();
        assert_eq!(
            names(&query(&directory, &config)),
            ["Hope House", "Youth Haven"]
        );
    }

    #[test]
    fn test_capacity_descending_with_unknown_as_zero() {
        let directory = Directory::from_records(vec![
            record("Dash", "-", None),
            record("Small", "4", None),
            record("Large", "40 beds", None),
            record("Blank", "", None),
            record("Also Small", "4", None),
        ]);
        let config = QueryConfig::builder().sort_by(SortBy::Capacity).build();
        assert_eq!(
            names(&query(&directory, &config)),
            ["Large", "Small", "Also Small", "Dash", "Blank"]
        );
    }

    #[test]
    fn test_name_sort_ignores_case() {
        let directory = Directory::from_records(vec![
            record("bravo", "1", None),
            record("Charlie", "1", None),
            record("alpha", "1", None),
            record("Alpha", "1", None),
        ]);
        assert_eq!(
            names(&query(&directory, &QueryConfig::default())),
            ["Alpha", "alpha", "bravo", "Charlie"]
        );
    }

    #[test]
    fn test_name_sort_folds_accents() {
        let directory = Directory::from_records(vec![
            record("Zion Shelter", "1", None),
            record("Éclair House", "1", None),
            record("Abri Centre", "1", None),
            record("Ödön Place", "1", None),
            record("Eclair House", "1", None),
        ]);
        assert_eq!(
            names(&query(&directory, &QueryConfig::default())),
            [
                "Abri Centre",
                "Eclair House",
                "Éclair House",
                "Ödön Place",
                "Zion Shelter"
            ]
        );
        assert_eq!(collation_key("Éclair"), "eclair");
    }

    #[test]
    fn test_query_is_idempotent_and_pure() {
        let directory = scenario_directory();
        let config = QueryConfig::builder()
            .sort_by(SortBy::Capacity)
            .reference(LAKEVIEW)
            .build();

        let first = query(&directory, &config);
        let second = query(&directory, &config);
        assert_eq!(first.len(), second.len());
        assert!(
            first
                .iter()
                .zip(&second)
                .all(|(a, b)| std::ptr::eq(*a, *b))
        );
        assert_eq!(directory.all()[0].name, "Hope House", "source order untouched");
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("Emergency".parse::<Category>().unwrap(), Category::Emergency);
        assert_eq!(" family ".parse::<Category>().unwrap(), Category::Family);
        assert_eq!("DISTANCE".parse::<SortBy>().unwrap(), SortBy::Distance);
        assert!(matches!(
            "shelter".parse::<Category>(),
            Err(HavenError::ConfigError(_))
        ));
        assert!(matches!(
            "rating".parse::<SortBy>(),
            Err(HavenError::ConfigError(_))
        ));
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }
}
