//! Driver name mapping and one-time driver registration.

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{ConnectError, Result};

static DRIVERS_INSTALLED: OnceCell<()> = OnceCell::new();

/// Database backends a `DriverType` can name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    MySql,
    Postgres,
    Sqlite,
}

impl DriverKind {
    /// Map a configured driver name (JDBC class name or short alias).
    pub fn from_driver_type(driver_type: &str) -> Option<Self> {
        match driver_type {
            "com.mysql.jdbc.Driver"
            | "com.mysql.cj.jdbc.Driver"
            | "org.gjt.mm.mysql.Driver"
            | "org.mariadb.jdbc.Driver"
            | "mysql"
            | "mariadb" => Some(Self::MySql),
            "org.postgresql.Driver" | "postgres" | "postgresql" => Some(Self::Postgres),
            "org.sqlite.JDBC" | "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Whether username and password travel in the connection URL.
    pub fn uses_credentials(self) -> bool {
        !matches!(self, Self::Sqlite)
    }
}

/// Resolve `driver_type` to a backend and make sure the client drivers are
/// installed. Installation happens once per process; concurrent first calls
/// block on the same cell instead of racing.
pub fn ensure_driver_registered(driver_type: &str) -> Result<DriverKind> {
    let kind = DriverKind::from_driver_type(driver_type)
        .ok_or_else(|| ConnectError::driver_init(driver_type, "unsupported driver type"))?;

    DRIVERS_INSTALLED.get_or_init(|| {
        sqlx::any::install_default_drivers();
        debug!("installed database client drivers");
    });

    Ok(kind)
}
