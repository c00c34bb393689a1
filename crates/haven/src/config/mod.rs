use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use haven_data_processing::{ColumnLayout, Coordinates, TableOptions, TableSource};

use crate::{
    error::{HavenError, Result},
    query::{Category, QueryConfig, SortBy},
};

/// Path used when no table source is configured.
pub const DEFAULT_TABLE_PATH: &str = "data/shelters.csv";

pub const ENV_TABLE: &str = "HAVEN_TABLE";
pub const ENV_GEOCODE_CONCURRENCY: &str = "HAVEN_GEOCODE_CONCURRENCY";
pub const ENV_GEOCODE_TIMEOUT_SECS: &str = "HAVEN_GEOCODE_TIMEOUT_SECS";

/// Limits applied to the geocoding fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeConfig {
    /// Maximum number of lookups in flight at once (at least 1)
    pub max_concurrent: usize,
    /// Per-lookup deadline; an expired lookup counts as a failure
    pub request_timeout: Duration,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything a load cycle needs except the geocoder itself.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub source: TableSource,
    pub table: TableOptions,
    pub layout: ColumnLayout,
    pub geocode: GeocodeConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            source: TableSource::File(PathBuf::from(DEFAULT_TABLE_PATH)),
            table: TableOptions::default(),
            layout: ColumnLayout::default(),
            geocode: GeocodeConfig::default(),
        }
    }
}

impl LoadConfig {
    pub fn builder() -> LoadConfigBuilder {
        LoadConfigBuilder::new()
    }

    /// Default configuration with `HAVEN_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Ok(LoadConfigBuilder::new().with_env()?.build())
    }
}

/// Builder for creating load configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct LoadConfigBuilder {
    config: LoadConfig,
}

impl LoadConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: LoadConfig::default(),
        }
    }

    /// One lookup at a time, for public Nominatim instances (1 request per second policy)
    pub fn polite() -> Self {
        let mut builder = Self::new();
        builder.config.geocode.max_concurrent = 1;
        builder.config.geocode.request_timeout = Duration::from_secs(20);
        builder
    }

    /// Many short lookups, for self-hosted or cached geocoders
    pub fn fast() -> Self {
        let mut builder = Self::new();
        builder.config.geocode.max_concurrent = 16;
        builder.config.geocode.request_timeout = Duration::from_secs(5);
        builder
    }

    pub fn source(mut self, source: TableSource) -> Self {
        self.config.source = source;
        self
    }

    /// Read the listing from memory instead of a file or URL
    pub fn inline_table(self, text: impl Into<String>) -> Self {
        self.source(TableSource::Inline(text.into()))
    }

    /// Set how many title lines precede the first data row
    pub fn header_rows(mut self, rows: usize) -> Self {
        self.config.table.header_rows = rows;
        self
    }

    /// Set how many columns are read per row
    pub fn table_width(mut self, width: usize) -> Self {
        self.config.table.width = width;
        self
    }

    pub fn layout(mut self, layout: ColumnLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Set the maximum number of concurrent geocode lookups (clamped to at least 1)
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.config.geocode.max_concurrent = max.max(1);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.geocode.request_timeout = timeout;
        self
    }

    /// Apply `HAVEN_*` overrides from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Apply `HAVEN_*` overrides from an arbitrary key lookup
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(location) = lookup(ENV_TABLE).filter(|v| !v.trim().is_empty()) {
            self = self.source(TableSource::parse(&location));
        }
        if let Some(max) = parse_override::<usize>(&lookup, ENV_GEOCODE_CONCURRENCY)? {
            self = self.max_concurrent(max);
        }
        if let Some(secs) = parse_override::<u64>(&lookup, ENV_GEOCODE_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(HavenError::ConfigError(format!(
                    "{ENV_GEOCODE_TIMEOUT_SECS} must be greater than zero"
                )));
            }
            self = self.request_timeout(Duration::from_secs(secs));
        }
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> LoadConfig {
        self.config
    }
}

fn parse_override<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| HavenError::ConfigError(format!("{key}={value:?}: {e}")))
        })
        .transpose()
}

/// Builder for directory queries
#[derive(Debug, Clone, Default)]
pub struct QueryConfigBuilder {
    config: QueryConfig,
}

impl QueryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: Category) -> Self {
        self.config.category = category;
        self
    }

    /// Case-insensitive substring matched against name and address
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.config.search_text = text.into();
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.config.sort_by = sort_by;
        self
    }

    /// Location that distance sorting measures from
    pub fn reference(mut self, reference: Coordinates) -> Self {
        self.config.reference = Some(reference);
        self
    }

    /// Sort by distance from `reference`
    pub fn nearest_to(self, reference: Coordinates) -> Self {
        self.sort_by(SortBy::Distance).reference(reference)
    }

    pub fn build(self) -> QueryConfig {
        self.config
    }
}
