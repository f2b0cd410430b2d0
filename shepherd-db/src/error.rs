use shepherd_core::ConfigError;
use thiserror::Error;

/// Failures while turning resolved parameters into a live connection
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Parameters could not be resolved or are incomplete
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The driver name does not map to a usable backend
    #[error("Failed to initialize driver '{driver}': {reason}")]
    DriverInit { driver: String, reason: String },

    #[error("Failed to open database connection: {0}")]
    ConnectionOpen(#[source] sqlx::Error),

    #[error("Failed to close database connection: {0}")]
    ConnectionClose(#[source] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, ConnectError>;

impl ConnectError {
    pub fn driver_init(driver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DriverInit {
            driver: driver.into(),
            reason: reason.into(),
        }
    }
}
