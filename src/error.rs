//! Error taxonomy shared by extractors, the geocode layer and the stores.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Unparseable document, or an archive without a placemark document inside
    #[error("format error: {0}")]
    Format(String),

    /// Recognized container, but nothing extractable in it
    #[error("no data found: {0}")]
    NoDataFound(String),

    /// Geocode provider could not be reached or answered with a server error
    #[error("geocode provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Missing provider credential or invalid settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Remote document could not be downloaded
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors caused by the submitted input rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Format(_)
                | Error::NoDataFound(_)
                | Error::Configuration(_)
                | Error::Spreadsheet(_)
                | Error::Csv(_)
        )
    }

    /// Errors caused by an upstream service.
    pub fn is_upstream_error(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_) | Error::Fetch(_))
    }
}
