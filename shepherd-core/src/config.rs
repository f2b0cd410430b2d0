use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::locator::ResourceLocator;
use crate::resolver::ConnectionResolver;

pub const ROOT_ENV: &str = "SHEPHERD_ROOT";
pub const DB_PROPERTIES_ENV: &str = "SHEPHERD_DB_PROPERTIES";

const LOCAL_CONFIG: &str = "shepherd.toml";
const DEFAULT_GLOBAL_PROPERTIES: &str = "${root}/WEB-INF/classes/database.properties";

/// Where a deployment lives and where its database properties are kept
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// Deployment root (the running web application's directory)
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Global database properties file. `${root}` and `${HOME}` are expanded.
    #[serde(default = "default_global_properties")]
    pub global_properties: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_global_properties() -> PathBuf {
    PathBuf::from(DEFAULT_GLOBAL_PROPERTIES)
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            global_properties: default_global_properties(),
        }
    }
}

/// User config directory (~/.shepherd)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".shepherd"))
}

fn read_layer(path: &Path) -> Result<ConfigLayer> {
    let contents = fs::read_to_string(path).map_err(|err| ConfigError::from_io(path, err))?;
    let layer = toml::from_str(&contents).map_err(|err| ConfigError::InvalidConfig {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    info!("Loaded deployment config from {}", path.display());
    Ok(layer)
}

/// One config file layer. Fields left out of the file keep the value from
/// the layer below.
#[derive(Debug, Deserialize)]
struct ConfigLayer {
    root: Option<PathBuf>,
    global_properties: Option<PathBuf>,
}

impl DeploymentConfig {
    /// Load the deployment config.
    ///
    /// Priority order (highest to lowest):
    /// 1. `SHEPHERD_ROOT` / `SHEPHERD_DB_PROPERTIES` (a `.env` file is honoured)
    /// 2. ./shepherd.toml
    /// 3. ~/.shepherd/config.toml
    /// 4. Built-in defaults
    pub fn load() -> Result<Self> {
        Self::load_with_root(None)
    }

    /// Load the deployment config with `root` taking priority over every
    /// other source. `${root}` is expanded against the overridden value.
    pub fn load_with_root(root: Option<PathBuf>) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded .env from {}", path.display());
        }

        let global = config_dir().map(|dir| dir.join("config.toml"));
        let mut config = Self::from_layers(global.as_deref(), Path::new(LOCAL_CONFIG))?;

        config.apply_env_overrides();
        if let Some(root) = root {
            config.root = root;
        }
        config.expand_variables();
        Ok(config)
    }

    /// Stack the global then the local config file over the defaults.
    /// Missing files are skipped. Nothing is expanded yet.
    pub fn from_layers(global: Option<&Path>, local: &Path) -> Result<Self> {
        let mut config = Self::default();
        for path in global.into_iter().chain(std::iter::once(local)) {
            if path.exists() {
                config = Self::merge(config, read_layer(path)?);
            }
        }
        Ok(config)
    }

    /// Parse a config file. A file that exists but is not valid TOML is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::merge(Self::default(), read_layer(path)?))
    }

    /// Merge a layer over a config (layer overrides base, field by field)
    fn merge(mut base: Self, layer: ConfigLayer) -> Self {
        if let Some(root) = layer.root {
            base.root = root;
        }
        if let Some(global_properties) = layer.global_properties {
            base.global_properties = global_properties;
        }
        base
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = env::var(ROOT_ENV) {
            self.root = PathBuf::from(root);
        }
        if let Ok(props) = env::var(DB_PROPERTIES_ENV) {
            self.global_properties = PathBuf::from(props);
        }
    }

    /// Expand ${root} and ${HOME} in the global properties path
    pub fn expand_variables(&mut self) {
        let root = self.root.display().to_string();
        let home = env::var("HOME").unwrap_or_default();

        let expanded = self
            .global_properties
            .display()
            .to_string()
            .replace("${root}", &root)
            .replace("${HOME}", &home);
        self.global_properties = PathBuf::from(expanded);
    }

    pub fn locator(&self) -> ResourceLocator {
        ResourceLocator::new(&self.global_properties)
    }

    pub fn resolver(&self) -> ConnectionResolver {
        ConnectionResolver::new(self.locator())
    }
}
