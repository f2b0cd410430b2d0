//! Structured error types for shepherd-core.
//!
//! Property lookups and resource location fail with the leaf variants.
//! The resolver wraps those in `Configuration` whenever the value was
//! mandatory.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for shepherd-core operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The property resource does not exist
    #[error("Property resource not found: {path:?}")]
    ResourceNotFound { path: PathBuf },

    /// The property resource exists but could not be opened or read
    #[error("Failed to read property resource {path:?}: {source}")]
    ResourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No line of the resource contains the requested key
    #[error("Property '{key}' not found in {path:?}")]
    PropertyNotFound { key: String, path: PathBuf },

    /// A challenge path or lesson name is empty once sanitized
    #[error("Invalid resource name '{name}'")]
    InvalidResourceName { name: String },

    /// A resolved connection parameter that must be set is empty
    #[error("Connection parameter '{field}' is empty")]
    EmptyParameter { field: &'static str },

    /// A mandatory value could not be resolved
    #[error("Configuration error ({context}): {source}")]
    Configuration {
        context: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// The deployment config file could not be parsed
    #[error("Invalid deployment config {path:?}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },
}

/// Result type alias for shepherd-core operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    /// Create a resource-not-found error
    pub fn resource_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ResourceNotFound { path: path.into() }
    }

    /// Classify an I/O failure on a resource: missing files are reported as
    /// `ResourceNotFound`, everything else as `ResourceRead`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::ResourceNotFound { path }
        } else {
            Self::ResourceRead { path, source }
        }
    }

    /// Create a property-not-found error
    pub fn property_not_found(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::PropertyNotFound {
            key: key.into(),
            path: path.into(),
        }
    }

    /// Create an invalid resource name error
    pub fn invalid_resource_name(name: impl Into<String>) -> Self {
        Self::InvalidResourceName { name: name.into() }
    }

    /// Wrap an error as a fatal configuration error
    pub fn configuration(context: impl Into<String>, source: ConfigError) -> Self {
        Self::Configuration {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn is_property_not_found(&self) -> bool {
        matches!(self, Self::PropertyNotFound { .. })
    }

    /// The innermost error, looking through `Configuration` wrappers
    pub fn root_cause(&self) -> &ConfigError {
        match self {
            Self::Configuration { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
