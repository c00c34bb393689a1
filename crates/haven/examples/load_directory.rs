//! Loading a directory with Nominatim
//!
//! Reads the table named by `HAVEN_TABLE` (a path or an http(s) URL) and
//! geocodes every shelter against the public Nominatim service, one request
//! at a time as its usage policy asks. Press Ctrl-C to abandon the load.
//!
//! ```sh
//! HAVEN_TABLE=data/shelters.csv cargo run --example load_directory
//! ```

use haven::{
    CancellationToken, DirectoryLoader, LoadConfigBuilder, NominatimConfig,
    NominatimGeocoder, QueryConfig, SortBy, query,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    haven::init_logging(tracing::Level::INFO)?;

    let config = LoadConfigBuilder::polite().with_env()?.build();
    let geocoder = NominatimGeocoder::new(NominatimConfig::default())?;
    let loader = DirectoryLoader::new(config, geocoder);

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        }
    });

    let directory = loader.load_directory_with_cancellation(&cancellation).await?;
    let stats = directory.stats();
    println!(
        "Loaded {} shelters from {} rows ({} geocoded, {} without coordinates)",
        stats.records, stats.raw_rows, stats.geocoded, stats.geocode_failures
    );

    let by_capacity = QueryConfig::builder().sort_by(SortBy::Capacity).build();
    for record in query(&directory, &by_capacity).into_iter().take(10) {
        let location = record
            .coordinates
            .map_or_else(|| "not geocoded".to_string(), |c| c.to_string());
        println!("{:<40} {:>5}  {location}", record.name, record.bed_capacity.raw());
    }

    Ok(())
}
