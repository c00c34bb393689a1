//! Haven - Shelter Directory Pipeline
//!
//! Haven turns a loosely-structured shelter listing into a geolocated,
//! queryable directory. A load cycle reads the raw table, reassembles each
//! shelter from its header and continuation rows, geocodes every address with
//! bounded concurrency, and publishes an immutable [`Directory`].
//!
//! # Quick Start
//!
//! ```rust
//! use haven::{
//!     Category, Coordinates, DirectoryLoader, GeocodeError, Geocoder, LoadConfig, QueryConfig,
//!     query,
//! };
//!
//! struct Lakeview;
//!
//! impl Geocoder for Lakeview {
//!     async fn resolve(&self, _address: &str) -> Result<Coordinates, GeocodeError> {
//!         Ok(Coordinates::new(41.94, -87.65))
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new()?.block_on(async {
//! let config = LoadConfig::builder()
//!     .inline_table(haven::data_processing::test_data::SCENARIO_TABLE)
//!     .header_rows(0)
//!     .build();
//! let directory = DirectoryLoader::new(config, Lakeview).load_directory().await?;
//!
//! let emergency = QueryConfig::builder().category(Category::Emergency).build();
//! let results = query(&directory, &emergency);
//! assert_eq!(results[0].name, "Hope House");
//! # Ok::<(), haven::error::HavenError>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Failure model
//!
//! Only an unreadable table fails a load ([`HavenError::SourceUnavailable`]).
//! Rows that fit no pattern are absorbed, records without a name are dropped,
//! and records whose address cannot be geocoded are kept without coordinates.
//! Such records still browse by name and category but sort last by distance.

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, util::SubscriberInitExt};

mod config;
pub mod directory;
pub mod distance;
pub mod error;
pub mod geocode;
mod loader;
pub mod query;

pub use config::{
    DEFAULT_TABLE_PATH, ENV_GEOCODE_CONCURRENCY, ENV_GEOCODE_TIMEOUT_SECS, ENV_TABLE,
    GeocodeConfig, LoadConfig, LoadConfigBuilder, QueryConfigBuilder,
};
pub use directory::{Directory, LoadStats};
pub use distance::{distance_between, distance_to, haversine_km};
pub use error::HavenError;
pub use geocode::{
    GeocodeError, GeocodeOutcome, GeocodeReport, Geocoder, NominatimConfig, NominatimGeocoder,
    geocode_records,
};
pub use haven_data_processing as data_processing;
pub use haven_data_processing::{
    BedCapacity, BedCount, ColumnLayout, Coordinates, RawRow, ShelterId, ShelterKind,
    ShelterRecord, TableOptions, TableSource,
};
pub use loader::DirectoryLoader;
pub use query::{Category, QueryConfig, SortBy, query};
pub use tokio_util::sync::CancellationToken;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for Haven.
///
/// Installs a `tracing` fmt subscriber once per process. `RUST_LOG` takes
/// precedence over `level`; HTTP and polars internals are held at `warn`.
///
/// ```rust
/// use haven::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), haven::error::HavenError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::HavenError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("polars=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .finish()
            .try_init()?;
        Ok(())
    })
}
