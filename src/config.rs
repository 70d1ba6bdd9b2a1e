//! Explicit configuration shared by every pipeline stage.
//!
//! A [`Config`] is plain data passed by reference to the operations that need it; nothing is
//! read from global state. Every section and field has a default, so a TOML file only names
//! what it changes:
//!
//! ```toml
//! [stereo]
//! hint_policy = "ignore_hints"
//!
//! [driver]
//! workers = 4
//! timeout_secs = 600
//!
//! [driver.xtb]
//! method = "gfn_ff"
//! ```

use crate::archive::ArchiveConfig;
use crate::driver::DriverConfig;
use crate::ops::{EmbedConfig, RankingConfig, StereoConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ranking: RankingConfig,
    pub stereo: StereoConfig,
    pub embed: EmbedConfig,
    pub archive: ArchiveConfig,
    pub driver: DriverConfig,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read configuration file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
