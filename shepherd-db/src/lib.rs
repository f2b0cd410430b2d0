//! Opening and closing database connections from resolved parameters.
//!
//! No pooling, retries or timeouts happen here; callers layer those on top.

pub mod driver;
pub mod error;

use std::fmt;
use std::path::Path;

use shepherd_core::{ConnectionParameters, ConnectionResolver, ResourceName};
use sqlx::any::AnyConnectOptions;
use sqlx::{AnyConnection, ConnectOptions, Connection};
use tracing::{debug, info, warn};
use url::Url;

pub use driver::{ensure_driver_registered, DriverKind};
pub use error::{ConnectError, Result};

/// A live database session owned by the caller.
///
/// Released with [`ConnectionHandle::close`], which consumes the handle.
pub struct ConnectionHandle {
    conn: AnyConnection,
    driver: DriverKind,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    pub fn connection_mut(&mut self) -> &mut AnyConnection {
        &mut self.conn
    }

    pub fn into_inner(self) -> AnyConnection {
        self.conn
    }

    /// Close the session. The handle is gone whether or not the server
    /// acknowledged the close.
    pub async fn close(self) -> Result<()> {
        match self.conn.close().await {
            Ok(()) => {
                info!(driver = ?self.driver, "closed database connection");
                Ok(())
            }
            Err(err) => {
                warn!(driver = ?self.driver, error = %err, "database connection did not close cleanly");
                Err(ConnectError::ConnectionClose(err))
            }
        }
    }
}

/// Open a connection for fully resolved parameters.
pub async fn open(params: &ConnectionParameters) -> Result<ConnectionHandle> {
    let driver = ensure_driver_registered(&params.driver_type)?;
    params.validate()?;

    let url = client_url(driver, params)?;
    let options = AnyConnectOptions::from_url(&url).map_err(ConnectError::ConnectionOpen)?;

    debug!(driver = ?driver, scheme = url.scheme(), "opening database connection");
    let conn = AnyConnection::connect_with(&options)
        .await
        .map_err(ConnectError::ConnectionOpen)?;

    info!(driver = ?driver, host = url.host_str().unwrap_or("local"), "opened database connection");
    Ok(ConnectionHandle { conn, driver })
}

/// Release a connection returned by [`open`].
pub async fn close(handle: ConnectionHandle) -> Result<()> {
    handle.close().await
}

/// Resolve `name` and open a connection for it.
pub async fn connect(
    resolver: &ConnectionResolver,
    name: &ResourceName,
    deployment_root: &Path,
    allow_multi: bool,
) -> Result<ConnectionHandle> {
    let params = resolver.resolve(name, deployment_root, allow_multi)?;
    open(&params).await
}

/// Build the client library URL: options appended, `jdbc:` prefix dropped,
/// credentials injected for network backends.
fn client_url(driver: DriverKind, params: &ConnectionParameters) -> Result<Url> {
    let full = params.url_with_options();
    let without_jdbc = full.strip_prefix("jdbc:").unwrap_or(&full);

    let mut url = Url::parse(without_jdbc).map_err(|err| invalid_url(err.to_string()))?;

    if driver.uses_credentials() {
        url.set_username(&params.username)
            .map_err(|()| invalid_url("URL cannot carry a username".to_string()))?;
        url.set_password(Some(&params.password))
            .map_err(|()| invalid_url("URL cannot carry a password".to_string()))?;
    }

    Ok(url)
}

fn invalid_url(reason: String) -> ConnectError {
    ConnectError::ConnectionOpen(sqlx::Error::Configuration(
        format!("invalid connection URL: {reason}").into(),
    ))
}
