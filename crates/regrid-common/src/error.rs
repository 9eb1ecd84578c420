//! Error types for regrid operations.

use thiserror::Error;

/// Result type alias using RegridError.
pub type Result<T> = std::result::Result<T, RegridError>;

/// Primary error type for grid, interpolation and spectral operations.
///
/// Every failure is raised where it is detected and propagated unchanged;
/// nothing in the engine retries or substitutes a partial result.
#[derive(Debug, Error)]
pub enum RegridError {
    // === Configuration Errors ===
    /// Unknown method, Lsm or grid-type string, or an unsupported option mix.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // === Geometry Errors ===
    /// Inconsistent grid definition or a truncation that cannot be honoured.
    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    // === Resource Errors ===
    /// A backing cache file or segment cannot be opened or created.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Option combinations and transformer pairs that have no implementation.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Discriminant of a [`RegridError`], convenient for matching in callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfiguration,
    GeometryMismatch,
    ResourceUnavailable,
    NotImplemented,
}

impl RegridError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn geometry_mismatch(msg: impl Into<String>) -> Self {
        Self::GeometryMismatch(msg.into())
    }

    pub fn resource_unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegridError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            RegridError::GeometryMismatch(_) => ErrorKind::GeometryMismatch,
            RegridError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            RegridError::NotImplemented(_) => ErrorKind::NotImplemented,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for RegridError {
    fn from(err: std::io::Error) -> Self {
        RegridError::ResourceUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for RegridError {
    fn from(err: serde_json::Error) -> Self {
        RegridError::InvalidConfiguration(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for RegridError {
    fn from(err: serde_yaml::Error) -> Self {
        RegridError::InvalidConfiguration(format!("YAML error: {}", err))
    }
}
