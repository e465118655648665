//! Error types for GeoRisk

use thiserror::Error;

/// Main error type for GeoRisk operations.
///
/// The variants group into the four failure classes the risk pipeline
/// distinguishes: geometry problems ([`Error::Geometry`]) skip one item,
/// missing inputs ([`Error::DataUnavailable`]) degrade the factor set,
/// classifier failures ([`Error::Classification`]) leave a change neutral,
/// and configuration problems ([`Error::InvalidParameter`], [`Error::Config`])
/// are fatal at construction time.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`]
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure is confined to a single polygon or asset
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Error::Geometry(_) | Error::UnsupportedCrs(_) | Error::Classification(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Result type alias for GeoRisk operations
pub type Result<T> = std::result::Result<T, Error>;
