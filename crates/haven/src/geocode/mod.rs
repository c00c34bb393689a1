//! Geocoding of reassembled records.
//!
//! [`geocode_records`] fans every record out to a [`Geocoder`], bounded by a
//! semaphore, and waits for all outcomes before returning. A failed lookup
//! only leaves that one record without coordinates.

use std::{future::Future, time::Duration};

use futures::future::join_all;
use haven_data_processing::{Coordinates, ShelterRecord};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::GeocodeConfig,
    error::{HavenError, Result},
};

mod nominatim;

pub use error::GeocodeError;
pub use nominatim::{NOMINATIM_URL, NominatimConfig, NominatimGeocoder};

/// External capability that resolves free-text addresses to coordinates.
///
/// Implementations may be slow, rate limited or unavailable; callers never
/// assume success.
pub trait Geocoder: Send + Sync {
    fn resolve(
        &self,
        address: &str,
    ) -> impl Future<Output = std::result::Result<Coordinates, GeocodeError>> + Send;
}

impl<G: Geocoder> Geocoder for std::sync::Arc<G> {
    fn resolve(
        &self,
        address: &str,
    ) -> impl Future<Output = std::result::Result<Coordinates, GeocodeError>> + Send {
        G::resolve(self, address)
    }
}

/// Result of geocoding one record.
#[derive(Debug)]
pub enum GeocodeOutcome {
    Resolved(Coordinates),
    Failed(GeocodeError),
}

impl GeocodeOutcome {
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Resolved(coordinates) => Some(*coordinates),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Geocoded records with one outcome per record, both in input order.
#[derive(Debug)]
pub struct GeocodeReport {
    records: Vec<ShelterRecord>,
    outcomes: Vec<GeocodeOutcome>,
}

impl GeocodeReport {
    #[must_use]
    pub fn records(&self) -> &[ShelterRecord] {
        &self.records
    }

    #[must_use]
    pub fn outcomes(&self) -> &[GeocodeOutcome] {
        &self.outcomes
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ShelterRecord, &GeocodeOutcome)> {
        self.records.iter().zip(&self.outcomes)
    }

    #[must_use]
    pub fn resolved(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_resolved()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.resolved()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<ShelterRecord> {
        self.records
    }
}

/// Geocode every record, attaching coordinates where resolution succeeds.
///
/// At most `config.max_concurrent` lookups are in flight at once and each one
/// is bounded by `config.request_timeout`. Output order always matches input
/// order. Cancelling `cancellation` abandons in-flight lookups and returns
/// [`HavenError::Cancelled`].
#[instrument(name = "Geocode records", skip_all, fields(records = records.len()), level = "info")]
pub async fn geocode_records<G: Geocoder>(
    mut records: Vec<ShelterRecord>,
    geocoder: &G,
    config: &GeocodeConfig,
    cancellation: &CancellationToken,
) -> Result<GeocodeReport> {
    let t_geocode = std::time::Instant::now();
    let semaphore = Semaphore::new(config.max_concurrent.max(1));
    let lookups = records
        .iter()
        .map(|record| geocode_one(record, geocoder, &semaphore, config.request_timeout));

    let outcomes = tokio::select! {
        biased;
        () = cancellation.cancelled() => {
            warn!("Geocoding cancelled, abandoning in-flight lookups");
            return Err(HavenError::Cancelled);
        }
        outcomes = join_all(lookups) => outcomes,
    };

    for (record, outcome) in records.iter_mut().zip(&outcomes) {
        record.coordinates = outcome.coordinates();
    }

    let report = GeocodeReport { records, outcomes };
    info!(
        resolved = report.resolved(),
        failed = report.failed(),
        elapsed = ?t_geocode.elapsed(),
        "Geocoding complete"
    );
    Ok(report)
}

async fn geocode_one<G: Geocoder>(
    record: &ShelterRecord,
    geocoder: &G,
    semaphore: &Semaphore,
    timeout: Duration,
) -> GeocodeOutcome {
    if record.address.is_empty() {
        debug!(id = %record.id, "No address to geocode");
        return GeocodeOutcome::Failed(GeocodeError::EmptyAddress);
    }

    let query = record.geocode_query();
    // The semaphore is never closed, so acquiring only waits.
    let _permit = semaphore.acquire().await.ok();

    let outcome = match tokio::time::timeout(timeout, geocoder.resolve(&query)).await {
        Ok(Ok(coordinates)) => GeocodeOutcome::Resolved(coordinates),
        Ok(Err(error)) => GeocodeOutcome::Failed(error),
        Err(_) => GeocodeOutcome::Failed(GeocodeError::Timeout(timeout)),
    };

    match &outcome {
        GeocodeOutcome::Resolved(coordinates) => {
            debug!(id = %record.id, %coordinates, "Geocoded");
        }
        GeocodeOutcome::Failed(reason) => {
            warn!(id = %record.id, query = %query, %reason, "Geocoding failed, keeping record without coordinates");
        }
    }
    outcome
}

mod error {
    use std::time::Duration;

    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum GeocodeError {
        #[error("record has no address to geocode")]
        EmptyAddress,
        #[error("no match for address")]
        NoMatch,
        #[error("geocoding service rate limit exceeded")]
        RateLimited,
        #[error("geocoding timed out after {0:?}")]
        Timeout(Duration),
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("invalid geocoder response: {0}")]
        InvalidResponse(String),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use ahash::AHashMap as HashMap;
    use haven_data_processing::{reassemble, test_data::scenario_rows};

    use super::*;

    /// Resolves addresses from a fixed table; unknown addresses fail.
    #[derive(Default)]
    struct TableGeocoder {
        known: HashMap<String, Coordinates>,
        hang_on: Option<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl TableGeocoder {
        fn with(entries: &[(&str, Coordinates)]) -> Self {
            Self {
                known: entries
                    .iter()
                    .map(|(address, coordinates)| ((*address).to_string(), *coordinates))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl Geocoder for TableGeocoder {
        async fn resolve(&self, address: &str) -> std::result::Result<Coordinates, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.hang_on.as_deref() == Some(address) {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.known.get(address).copied().ok_or(GeocodeError::NoMatch)
        }
    }

    const SPRINGFIELD: Coordinates = Coordinates::new(39.7817, -89.6501);
    const LAKEVIEW: Coordinates = Coordinates::new(41.9403, -87.6594);

    fn records_with_addresses(count: usize) -> Vec<ShelterRecord> {
        let mut records = reassemble(&scenario_rows());
        let template = records.remove(0);
        (0..count)
            .map(|i| ShelterRecord {
                name: format!("Shelter {i}"),
                address: format!("{i} Test St"),
                ..template.clone()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fault_isolation() {
        let records = reassemble(&scenario_rows());
        // Hope House's address is unknown, Youth Haven's resolves.
        let geocoder = TableGeocoder::with(&[("456 Oak Ave, Lakeview", LAKEVIEW)]);

        let report = geocode_records(
            records,
            &geocoder,
            &GeocodeConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.records().len(), 2);
        assert_eq!(report.resolved(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcomes()[0],
            GeocodeOutcome::Failed(GeocodeError::NoMatch)
        ));
        assert_eq!(report.records()[0].name, "Hope House");
        assert_eq!(report.records()[0].coordinates, None);
        assert_eq!(report.records()[1].coordinates, Some(LAKEVIEW));
    }

    #[tokio::test]
    async fn test_order_preserved_and_all_resolved() {
        let records = reassemble(&scenario_rows());
        let geocoder = TableGeocoder::with(&[
            ("123 Main St, Springfield", SPRINGFIELD),
            ("456 Oak Ave, Lakeview", LAKEVIEW),
        ]);

        let report = geocode_records(
            records,
            &geocoder,
            &GeocodeConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let names: Vec<_> = report.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Hope House", "Youth Haven"]);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.records()[0].coordinates, Some(SPRINGFIELD));
    }

    #[tokio::test]
    async fn test_empty_address_skips_geocoder() {
        let mut records = reassemble(&scenario_rows());
        records[0].address.clear();
        let geocoder = TableGeocoder::with(&[(", Springfield", SPRINGFIELD)]);

        let report = geocode_records(
            records,
            &geocoder,
            &GeocodeConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(
            report.outcomes()[0],
            GeocodeOutcome::Failed(GeocodeError::EmptyAddress)
        ));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failure() {
        let records = reassemble(&scenario_rows());
        let geocoder = TableGeocoder {
            hang_on: Some("123 Main St, Springfield".to_string()),
            ..TableGeocoder::with(&[("456 Oak Ave, Lakeview", LAKEVIEW)])
        };
        let config = GeocodeConfig {
            request_timeout: Duration::from_secs(2),
            ..GeocodeConfig::default()
        };

        let report = geocode_records(records, &geocoder, &config, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            report.outcomes()[0],
            GeocodeOutcome::Failed(GeocodeError::Timeout(_))
        ));
        assert_eq!(report.records()[1].coordinates, Some(LAKEVIEW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let geocoder = TableGeocoder {
            delay: Duration::from_millis(50),
            ..TableGeocoder::default()
        };
        let config = GeocodeConfig {
            max_concurrent: 2,
            ..GeocodeConfig::default()
        };

        let report = geocode_records(
            records_with_addresses(7),
            &geocoder,
            &config,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.failed(), 7);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 7);
        assert!(geocoder.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_batch() {
        let geocoder = Arc::new(TableGeocoder {
            hang_on: Some("0 Test St, Springfield".to_string()),
            ..TableGeocoder::default()
        });
        let config = GeocodeConfig {
            request_timeout: Duration::from_secs(3600),
            ..GeocodeConfig::default()
        };
        let cancellation = CancellationToken::new();

        let canceller = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result =
            geocode_records(records_with_addresses(3), &geocoder, &config, &cancellation).await;
        assert!(matches!(result, Err(HavenError::Cancelled)));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = geocode_records(
            Vec::new(),
            &TableGeocoder::default(),
            &GeocodeConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(report.records().is_empty());
        assert_eq!(report.resolved(), 0);
    }
}
