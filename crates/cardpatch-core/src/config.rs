//! Optional TOML configuration
//!
//! ```toml
//! [profile]
//! size_field_offset = 0x18
//! metadata_start = 0x30
//!
//! [locate]
//! tolerance_percent = 10
//! prefix_len = 64
//!
//! [verify]
//! enabled = true
//! markers = ["CARD"]
//! ```
//!
//! Every key is optional; omitted keys take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::locate::LocateOptions;
use crate::profile::FormatProfile;

/// Default configuration file name
pub const CONFIG_FILE: &str = "cardpatch.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: FormatProfile,
    pub locate: LocateOptions,
    pub verify: VerifyConfig,
}

/// Post-save verification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub enabled: bool,
    /// Strings expected somewhere in the saved container
    pub markers: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            markers: Vec::new(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when it is missing or invalid
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) if e.is_not_found() => {
                debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Failed to load config {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.locate.tolerance_percent > 100 {
            return Err(Error::Config(format!(
                "locate.tolerance_percent must be at most 100, got {}",
                self.locate.tolerance_percent
            )));
        }
        if self.locate.prefix_len == 0 {
            return Err(Error::Config(
                "locate.prefix_len must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
