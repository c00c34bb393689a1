//! Querying a directory offline
//!
//! This example loads a generated listing with a stand-in geocoder and shows
//! how category filters, search text and the three sort orders combine.

use haven::{
    Category, Coordinates, Directory, DirectoryLoader, GeocodeError, Geocoder, LoadConfig,
    QueryConfig, SortBy, data_processing::test_data::TestTableConfig, distance_to, query,
};

/// Places every shelter along a line east of the origin, by street number.
struct StreetNumberGeocoder;

impl Geocoder for StreetNumberGeocoder {
    async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let number: f64 = address
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or(GeocodeError::NoMatch)?;
        if number as u32 % 7 == 0 {
            return Err(GeocodeError::NoMatch);
        }
        Ok(Coordinates::new(0.0, (number - 100.0) / 100.0))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    haven::init_logging(tracing::Level::INFO)?;

    let text = haven::data_processing::test_data::create_test_table_text(&TestTableConfig {
        shelters: 20,
        ..TestTableConfig::default()
    });
    let config = LoadConfig::builder().inline_table(text).build();
    let directory = DirectoryLoader::new(config, StreetNumberGeocoder)
        .load_directory()
        .await?;

    println!("Loaded {:?}\n", directory.stats());

    let here = Coordinates::new(0.0, 0.05);
    show(
        &directory,
        "Emergency shelters by name",
        &QueryConfig::builder().category(Category::Emergency).build(),
        here,
    );
    show(
        &directory,
        "Family shelters, largest first",
        &QueryConfig::builder()
            .category(Category::Family)
            .sort_by(SortBy::Capacity)
            .build(),
        here,
    );
    show(
        &directory,
        "Everything matching \"11\", nearest first",
        &QueryConfig::builder().search("11").nearest_to(here).build(),
        here,
    );

    Ok(())
}

fn show(directory: &Directory, title: &str, config: &QueryConfig, here: Coordinates) {
    println!("{title}:");
    for record in query(directory, config) {
        let distance = distance_to(record, here)
            .map_or_else(|| "unknown".to_string(), |km| format!("{km:.1} km"));
        println!(
            "  {:<12} {:<14} beds: {:<3} distance: {distance}",
            record.name,
            record.category,
            record.bed_capacity.raw()
        );
    }
    println!();
}
