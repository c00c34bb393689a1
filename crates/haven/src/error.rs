use thiserror::Error;

#[derive(Error, Debug)]
pub enum HavenError {
    /// The raw table could not be fetched or decoded. Fatal to a load.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] haven_data_processing::DataError),
    #[error("Load cancelled before the directory was published")]
    Cancelled,
    #[error("Geocoder error: {0}")]
    Geocoder(#[from] crate::geocode::GeocodeError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),
    #[error("Init Logging error: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

pub type Result<T> = std::result::Result<T, HavenError>;
