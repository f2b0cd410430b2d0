pub mod config;
pub mod error;
pub mod locator;
pub mod properties;
pub mod resolver;

pub use config::DeploymentConfig;
pub use error::{ConfigError, Result};
pub use locator::{sanitize_segment, ResourceLocator, ResourceName, ResourcePaths};
pub use properties::{load_properties, read_property, read_standard_property, PropertySource};
pub use resolver::{ConnectionParameters, ConnectionResolver, MULTI_STATEMENT_OPTION};
