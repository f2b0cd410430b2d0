//! Mapping logical resource names to property files on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, Result};

/// Directory next to the global properties file holding one file per challenge.
pub const CHALLENGES_DIR: &str = "challenges";

/// Lesson property files, relative to the deployment root.
pub const LESSONS_DIR: &str = "WEB-INF/classes/lessons";

const PROPERTIES_EXT: &str = "properties";

/// Which schema a caller wants to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceName {
    /// Core application schema (global URL plus `databaseSchema`)
    Core,
    /// Default application connection (global URL, no schema suffix)
    Application,
    /// Per-challenge schema; the path is user-influenced
    Challenge(String),
    /// Lesson-specific schema
    Lesson(String),
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core => write!(f, "core"),
            Self::Application => write!(f, "application"),
            Self::Challenge(path) => write!(f, "challenge:{path}"),
            Self::Lesson(name) => write!(f, "lesson:{name}"),
        }
    }
}

impl FromStr for ResourceName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("challenge", path)) => Ok(Self::Challenge(path.to_string())),
            Some(("lesson", name)) => Ok(Self::Lesson(name.to_string())),
            None if s == "core" => Ok(Self::Core),
            None if s == "application" => Ok(Self::Application),
            _ => Err(ConfigError::invalid_resource_name(s)),
        }
    }
}

/// Strip every `.` and `/` from a user-influenced path segment.
pub fn sanitize_segment(segment: &str) -> String {
    segment.chars().filter(|c| !matches!(c, '.' | '/')).collect()
}

/// Property files backing one resource, in read order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    /// Deployment-wide database properties
    pub global: PathBuf,
    /// Challenge or lesson overlay, if the resource has one
    pub overlay: Option<PathBuf>,
}

impl ResourcePaths {
    /// Resource ids in read order, global first.
    pub fn ids(&self) -> Vec<&Path> {
        std::iter::once(self.global.as_path())
            .chain(self.overlay.as_deref())
            .collect()
    }
}

/// Resolves [`ResourceName`]s against a fixed global properties file.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    global_properties: PathBuf,
}

impl ResourceLocator {
    pub fn new(global_properties: impl Into<PathBuf>) -> Self {
        Self {
            global_properties: global_properties.into(),
        }
    }

    pub fn global_properties(&self) -> &Path {
        &self.global_properties
    }

    /// Directory holding per-challenge property files.
    pub fn challenges_dir(&self) -> PathBuf {
        self.global_properties
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(CHALLENGES_DIR)
    }

    pub fn locate(&self, name: &ResourceName, deployment_root: &Path) -> Result<ResourcePaths> {
        let overlay = match name {
            ResourceName::Core | ResourceName::Application => None,
            ResourceName::Challenge(path) => {
                let file = properties_file_name(path)?;
                Some(self.challenges_dir().join(file))
            }
            ResourceName::Lesson(lesson) => {
                let file = properties_file_name(lesson)?;
                Some(deployment_root.join(LESSONS_DIR).join(file))
            }
        };

        if let Some(ref overlay) = overlay {
            debug!(resource = %name, overlay = %overlay.display(), "located overlay properties");
        }

        Ok(ResourcePaths {
            global: self.global_properties.clone(),
            overlay,
        })
    }
}

fn properties_file_name(segment: &str) -> Result<String> {
    let sanitized = sanitize_segment(segment);
    if sanitized.is_empty() {
        return Err(ConfigError::invalid_resource_name(segment));
    }
    Ok(format!("{sanitized}.{PROPERTIES_EXT}"))
}
