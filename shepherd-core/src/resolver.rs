//! Layering global and per-resource properties into connection parameters.
//!
//! Every resolution re-reads its property files. Mandatory values that cannot
//! be read are escalated to [`ConfigError::Configuration`]; the only value
//! that may be absent is `databaseOptions`, which defaults to an empty string.

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};
use tracing::{debug, error};

use crate::error::{ConfigError, Result};
use crate::locator::{ResourceLocator, ResourceName};
use crate::properties::read_property;

pub const KEY_CONNECTION_URL: &str = "databaseConnectionURL";
pub const KEY_DRIVER_TYPE: &str = "DriverType";
pub const KEY_SCHEMA: &str = "databaseSchema";
pub const KEY_USERNAME: &str = "databaseUsername";
pub const KEY_PASSWORD: &str = "databasePassword";
pub const KEY_OPTIONS: &str = "databaseOptions";

/// Option enabling multiple statements per query.
pub const MULTI_STATEMENT_OPTION: &str = "allowMultiQueries=yes";

/// Everything needed to open one database connection.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParameters {
    pub driver_type: String,
    #[serde(rename = "connectionURL")]
    pub connection_url: String,
    pub options: String,
    pub username: String,
    #[serde(serialize_with = "redact")]
    pub password: String,
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("driver_type", &self.driver_type)
            .field("connection_url", &self.connection_url)
            .field("options", &self.options)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn redact<S: Serializer>(_: &str, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str("[REDACTED]")
}

impl ConnectionParameters {
    /// Append an option group, joining with `&` when options are already set.
    pub fn push_option(&mut self, option: &str) {
        if !self.options.is_empty() {
            self.options.push('&');
        }
        self.options.push_str(option);
    }

    /// Connection URL with the options query appended when there is one.
    pub fn url_with_options(&self) -> String {
        if self.options.is_empty() {
            self.connection_url.clone()
        } else {
            format!("{}?{}", self.connection_url, self.options)
        }
    }

    /// Check that every field except `options` is set.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("driverType", &self.driver_type),
            ("connectionURL", &self.connection_url),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ConfigError::configuration(
                    "connection parameters",
                    ConfigError::EmptyParameter { field },
                ));
            }
        }
        Ok(())
    }
}

/// Builds [`ConnectionParameters`] for a [`ResourceName`].
#[derive(Debug, Clone)]
pub struct ConnectionResolver {
    locator: ResourceLocator,
}

impl ConnectionResolver {
    pub fn new(locator: ResourceLocator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn resolve(
        &self,
        name: &ResourceName,
        deployment_root: &Path,
        allow_multi: bool,
    ) -> Result<ConnectionParameters> {
        let paths = self
            .locator
            .locate(name, deployment_root)
            .map_err(|err| ConfigError::configuration(name.to_string(), err))?;
        let global = paths.global.as_path();

        let mut params = match (name, paths.overlay.as_deref()) {
            (ResourceName::Core, _) => {
                let mut connection_url = mandatory(global, KEY_CONNECTION_URL)?;
                connection_url.push_str(&mandatory(global, KEY_SCHEMA)?);
                ConnectionParameters {
                    driver_type: mandatory(global, KEY_DRIVER_TYPE)?,
                    connection_url,
                    username: mandatory(global, KEY_USERNAME)?,
                    password: mandatory(global, KEY_PASSWORD)?,
                    options: optional_options(global)?,
                }
            }
            (ResourceName::Application, _) => ConnectionParameters {
                connection_url: mandatory(global, KEY_CONNECTION_URL)?,
                driver_type: mandatory(global, KEY_DRIVER_TYPE)?,
                username: mandatory(global, KEY_USERNAME)?,
                password: mandatory(global, KEY_PASSWORD)?,
                options: optional_options(global)?,
            },
            (ResourceName::Challenge(_), Some(overlay)) => {
                let mut params = layered(global, overlay)?;
                params.options = optional_options(overlay)?;
                params
            }
            (ResourceName::Lesson(_), Some(overlay)) => layered(global, overlay)?,
            (_, None) => {
                return Err(ConfigError::configuration(
                    name.to_string(),
                    ConfigError::invalid_resource_name(name.to_string()),
                ))
            }
        };

        if allow_multi {
            params.push_option(MULTI_STATEMENT_OPTION);
        }

        debug!(
            resource = %name,
            driver = %params.driver_type,
            url = %params.connection_url,
            options = %params.options,
            "resolved connection parameters"
        );
        Ok(params)
    }
}

// Base URL and driver from the global file; URL suffix and credentials from
// the overlay. Options start empty.
fn layered(global: &Path, overlay: &Path) -> Result<ConnectionParameters> {
    let mut connection_url = mandatory(global, KEY_CONNECTION_URL)?;
    let driver_type = mandatory(global, KEY_DRIVER_TYPE)?;

    connection_url.push_str(&mandatory(overlay, KEY_CONNECTION_URL)?);

    Ok(ConnectionParameters {
        driver_type,
        connection_url,
        options: String::new(),
        username: mandatory(overlay, KEY_USERNAME)?,
        password: mandatory(overlay, KEY_PASSWORD)?,
    })
}

fn mandatory(resource: &Path, key: &str) -> Result<String> {
    read_property(resource, key).map_err(|err| {
        error!(key, resource = %resource.display(), error = %err, "could not read mandatory property");
        ConfigError::configuration(format!("reading {key}"), err)
    })
}

fn optional_options(resource: &Path) -> Result<String> {
    match read_property(resource, KEY_OPTIONS) {
        Ok(options) => Ok(options),
        Err(err) if err.is_property_not_found() => {
            debug!(resource = %resource.display(), "no database options, defaulting to empty");
            Ok(String::new())
        }
        Err(err) => Err(ConfigError::configuration(format!("reading {KEY_OPTIONS}"), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const GLOBAL: &str = "databaseConnectionURL=jdbc:x://h/\n\
                          databaseSchema=core\n\
                          DriverType=org.x.Driver\n\
                          databaseUsername=u\n\
                          databasePassword=p\n";

    struct Deployment {
        root: TempDir,
    }

    impl Deployment {
        fn new(global: &str) -> Self {
            let root = tempfile::tempdir().unwrap();
            let classes = root.path().join("WEB-INF/classes");
            fs::create_dir_all(classes.join("challenges")).unwrap();
            fs::create_dir_all(classes.join("lessons")).unwrap();
            fs::write(classes.join("database.properties"), global).unwrap();
            Self { root }
        }

        fn global_path(&self) -> PathBuf {
            self.root.path().join("WEB-INF/classes/database.properties")
        }

        fn challenge(&self, name: &str, contents: &str) {
            let path = self
                .root
                .path()
                .join("WEB-INF/classes/challenges")
                .join(format!("{name}.properties"));
            fs::write(path, contents).unwrap();
        }

        fn lesson(&self, name: &str, contents: &str) {
            let path = self
                .root
                .path()
                .join("WEB-INF/classes/lessons")
                .join(format!("{name}.properties"));
            fs::write(path, contents).unwrap();
        }

        fn resolve(&self, name: ResourceName, allow_multi: bool) -> Result<ConnectionParameters> {
            ConnectionResolver::new(ResourceLocator::new(self.global_path())).resolve(
                &name,
                self.root.path(),
                allow_multi,
            )
        }
    }

    #[test]
    fn test_core_without_options() {
        let deployment = Deployment::new(GLOBAL);
        let params = deployment.resolve(ResourceName::Core, false).unwrap();

        assert_eq!(
            params,
            ConnectionParameters {
                driver_type: "org.x.Driver".into(),
                connection_url: "jdbc:x://h/core".into(),
                options: String::new(),
                username: "u".into(),
                password: "p".into(),
            }
        );
    }

    #[test]
    fn test_core_allow_multi_has_no_leading_separator() {
        let deployment = Deployment::new(GLOBAL);
        let params = deployment.resolve(ResourceName::Core, true).unwrap();
        assert_eq!(params.options, "allowMultiQueries=yes");
    }

    #[test]
    fn test_allow_multi_appends_to_existing_options() {
        let deployment = Deployment::new(&format!("{GLOBAL}databaseOptions=useSSL=false\n"));
        let params = deployment.resolve(ResourceName::Core, true).unwrap();
        assert_eq!(params.options, "useSSL=false&allowMultiQueries=yes");
    }

    #[test]
    fn test_core_missing_schema_is_configuration_error() {
        let deployment = Deployment::new(&GLOBAL.replace("databaseSchema=core\n", ""));
        let err = deployment.resolve(ResourceName::Core, false).unwrap_err();

        assert!(matches!(err, ConfigError::Configuration { .. }));
        assert!(err.root_cause().is_property_not_found());
    }

    #[test]
    fn test_application_ignores_schema() {
        let deployment = Deployment::new(GLOBAL);
        let params = deployment.resolve(ResourceName::Application, false).unwrap();
        assert_eq!(params.connection_url, "jdbc:x://h/");
        assert_eq!(params.username, "u");
    }

    #[test]
    fn test_challenge_layers_overlay() {
        let deployment = Deployment::new(GLOBAL);
        deployment.challenge(
            "lvl1",
            "databaseConnectionURL=lvl1schema\n\
             databaseUsername=lvl1user\n\
             databasePassword=lvl1pass\n\
             databaseOptions=useUnicode=true\n",
        );

        let params = deployment
            .resolve(ResourceName::Challenge("lvl1".into()), false)
            .unwrap();

        assert_eq!(params.driver_type, "org.x.Driver");
        assert_eq!(params.connection_url, "jdbc:x://h/lvl1schema");
        assert_eq!(params.username, "lvl1user");
        assert_eq!(params.password, "lvl1pass");
        assert_eq!(params.options, "useUnicode=true");
    }

    #[test]
    fn test_challenge_ignores_global_options() {
        let deployment = Deployment::new(&format!("{GLOBAL}databaseOptions=useSSL=false\n"));
        deployment.challenge(
            "lvl1",
            "databaseConnectionURL=s\ndatabaseUsername=a\ndatabasePassword=b\n",
        );

        let params = deployment
            .resolve(ResourceName::Challenge("lvl1".into()), false)
            .unwrap();
        assert_eq!(params.options, "");
    }

    #[test]
    fn test_challenge_missing_username_is_fatal() {
        let deployment = Deployment::new(GLOBAL);
        deployment.challenge("lvl1", "databaseConnectionURL=s\ndatabasePassword=b\n");

        let err = deployment
            .resolve(ResourceName::Challenge("lvl1".into()), false)
            .unwrap_err();

        match err {
            ConfigError::Configuration { source, .. } => {
                assert!(matches!(*source, ConfigError::PropertyNotFound { ref key, .. } if key == KEY_USERNAME));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_challenge_file_is_fatal() {
        let deployment = Deployment::new(GLOBAL);
        let err = deployment
            .resolve(ResourceName::Challenge("nope".into()), false)
            .unwrap_err();

        assert!(matches!(
            err.root_cause(),
            ConfigError::ResourceNotFound { .. }
        ));
    }

    #[test]
    fn test_traversal_stays_in_challenges_dir() {
        let deployment = Deployment::new(GLOBAL);
        deployment.challenge(
            "etcpasswd",
            "databaseConnectionURL=s\ndatabaseUsername=a\ndatabasePassword=b\n",
        );

        let params = deployment
            .resolve(ResourceName::Challenge("../../etc/passwd".into()), false)
            .unwrap();
        assert_eq!(params.connection_url, "jdbc:x://h/s");
    }

    #[test]
    fn test_lesson_never_applies_options() {
        let deployment = Deployment::new(GLOBAL);
        deployment.lesson(
            "SqlInjLesson",
            "databaseConnectionURL=SqlInjLesson\n\
             databaseUsername=lessonUser\n\
             databasePassword=lessonPass\n\
             databaseOptions=ignored=1\n",
        );

        let params = deployment
            .resolve(ResourceName::Lesson("SqlInjLesson".into()), false)
            .unwrap();

        assert_eq!(params.connection_url, "jdbc:x://h/SqlInjLesson");
        assert_eq!(params.username, "lessonUser");
        assert_eq!(params.options, "");
    }

    #[test]
    fn test_missing_global_file_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let resolver =
            ConnectionResolver::new(ResourceLocator::new(root.path().join("database.properties")));

        let err = resolver
            .resolve(&ResourceName::Core, root.path(), false)
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ConfigError::ResourceNotFound { .. }
        ));
    }

    #[test]
    fn test_invalid_challenge_name_is_fatal() {
        let deployment = Deployment::new(GLOBAL);
        let err = deployment
            .resolve(ResourceName::Challenge("./.".into()), false)
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ConfigError::InvalidResourceName { .. }
        ));
    }

    #[test]
    fn test_modified_global_is_reread() {
        let deployment = Deployment::new(GLOBAL);
        assert_eq!(
            deployment.resolve(ResourceName::Core, false).unwrap().username,
            "u"
        );

        fs::write(
            deployment.global_path(),
            GLOBAL.replace("databaseUsername=u", "databaseUsername=rotated"),
        )
        .unwrap();
        assert_eq!(
            deployment.resolve(ResourceName::Core, false).unwrap().username,
            "rotated"
        );
    }

    #[test]
    fn test_url_with_options() {
        let mut params = ConnectionParameters {
            driver_type: "d".into(),
            connection_url: "jdbc:mysql://h/core".into(),
            options: String::new(),
            username: "u".into(),
            password: "p".into(),
        };
        assert_eq!(params.url_with_options(), "jdbc:mysql://h/core");

        params.push_option("useSSL=false");
        params.push_option(MULTI_STATEMENT_OPTION);
        assert_eq!(
            params.url_with_options(),
            "jdbc:mysql://h/core?useSSL=false&allowMultiQueries=yes"
        );
    }

    #[test]
    fn test_validate_rejects_empty_credentials() {
        let params = ConnectionParameters {
            driver_type: "d".into(),
            connection_url: "u".into(),
            options: String::new(),
            username: "user".into(),
            password: String::new(),
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ConfigError::EmptyParameter { field: "password" }
        ));
    }

    #[test]
    fn test_password_is_redacted() {
        let params = ConnectionParameters {
            driver_type: "d".into(),
            connection_url: "u".into(),
            options: String::new(),
            username: "user".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{params:?}").contains("hunter2"));

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["password"], "[REDACTED]");
        assert_eq!(json["connectionURL"], "u");
        assert_eq!(json["driverType"], "d");
    }
}
