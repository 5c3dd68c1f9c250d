//! User configuration: named locations and rounding, loaded from ~/.zmanim/config.yaml.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dsl::{ContextError, EvaluationContext};
use crate::time::RoundingMode;

/// A place formulas are evaluated for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres above sea level.
    #[serde(default)]
    pub elevation: f64,
    /// IANA timezone name, e.g. "Asia/Jerusalem".
    pub timezone: String,
}

impl LocationConfig {
    pub fn to_context(&self, date: NaiveDate) -> Result<EvaluationContext, ContextError> {
        EvaluationContext::with_timezone_name(
            date,
            self.latitude,
            self.longitude,
            self.elevation,
            &self.timezone,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZmanimConfig {
    /// How times are rounded to the minute for display.
    #[serde(default)]
    pub rounding: RoundingMode,
    /// Location used when none is given on the command line.
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default)]
    pub locations: BTreeMap<String, LocationConfig>,
}

/// Default config path (~/.zmanim/config.yaml).
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".zmanim").join("config.yaml"))
}

impl ZmanimConfig {
    /// Load from the standard path. Returns None if the file doesn't exist or doesn't parse.
    pub fn load() -> Option<Self> {
        let path = config_path()?;
        let content = std::fs::read_to_string(path).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    /// Load from an explicit path, reporting malformed files.
    pub fn load_from(path: &Path) -> Result<Self, io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save to a path, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self).map_err(io::Error::other)?;
        std::fs::write(path, yaml)
    }

    /// A named location, or the default one when `name` is None.
    pub fn location(&self, name: Option<&str>) -> Option<&LocationConfig> {
        let name = name.or(self.default_location.as_deref())?;
        self.locations.get(name)
    }
}
