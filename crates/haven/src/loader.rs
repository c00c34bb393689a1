//! Load cycle: fetch, reassemble, geocode, publish.
//!
//! ```rust,no_run
//! use haven::{DirectoryLoader, LoadConfig};
//!
//! # async fn run() -> haven::error::Result<()> {
//! let loader = DirectoryLoader::with_nominatim(LoadConfig::from_env()?)?;
//! let directory = loader.load_directory().await?;
//! println!("{} shelters", directory.len());
//! # Ok(())
//! # }
//! ```

use haven_data_processing::{fetch_raw_table, reassemble_with_layout};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    config::LoadConfig,
    directory::{Directory, LoadStats},
    error::{HavenError, Result},
    geocode::{Geocoder, NominatimConfig, NominatimGeocoder, geocode_records},
};

/// Builds [`Directory`] snapshots from a configured table source and geocoder.
///
/// Each call to [`load_directory`](Self::load_directory) produces a brand new
/// directory; earlier snapshots held by callers are never touched.
#[derive(Debug, Clone)]
pub struct DirectoryLoader<G> {
    config: LoadConfig,
    geocoder: G,
}

impl DirectoryLoader<NominatimGeocoder> {
    /// Loader using the public Nominatim service with default settings.
    pub fn with_nominatim(config: LoadConfig) -> Result<Self> {
        let geocoder = NominatimGeocoder::new(NominatimConfig::default())?;
        Ok(Self::new(config, geocoder))
    }
}

impl<G: Geocoder> DirectoryLoader<G> {
    pub fn new(config: LoadConfig, geocoder: G) -> Self {
        Self { config, geocoder }
    }

    #[must_use]
    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    #[must_use]
    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    /// Run a full load cycle.
    ///
    /// Only an unreadable source fails the load. Geocoding failures leave the
    /// affected records without coordinates and records without a name are
    /// dropped.
    pub async fn load_directory(&self) -> Result<Directory> {
        self.load_directory_with_cancellation(&CancellationToken::new())
            .await
    }

    /// Like [`load_directory`](Self::load_directory), but abandons the cycle
    /// with [`HavenError::Cancelled`] once `cancellation` fires. A cancelled
    /// cycle never publishes a directory.
    #[instrument(name = "Load directory", skip_all, fields(source = %self.config.source.describe()), level = "info")]
    pub async fn load_directory_with_cancellation(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<Directory> {
        let t_load = std::time::Instant::now();

        let rows = tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                warn!("Load cancelled while fetching the table");
                return Err(HavenError::Cancelled);
            }
            rows = fetch_raw_table(&self.config.source, &self.config.table) => rows?,
        };

        let records = reassemble_with_layout(&rows, &self.config.layout);
        let report = geocode_records(
            records,
            &self.geocoder,
            &self.config.geocode,
            cancellation,
        )
        .await?;

        if cancellation.is_cancelled() {
            return Err(HavenError::Cancelled);
        }

        let stats = LoadStats {
            raw_rows: rows.len(),
            records: report.records().len(),
            geocoded: report.resolved(),
            geocode_failures: report.failed(),
        };
        let directory = Directory::publish(report.into_records(), stats);

        info!(
            raw_rows = stats.raw_rows,
            records = stats.records,
            geocoded = stats.geocoded,
            failures = stats.geocode_failures,
            elapsed_ms = t_load.elapsed().as_millis(),
            "Directory published"
        );
        Ok(directory)
    }
}
