//! Narrow, typed contract for external geometry and property tools.
//!
//! A [`Driver`] takes a molecule and one of its conformers and returns a new conformer plus
//! whatever scalar properties the tool reports. Implementations are chosen by
//! [`DriverKind`] from configuration. Process handling (scratch directories, timeouts, exit
//! status) lives in [`exec`]; [`batch`] runs many jobs on a bounded pool.

pub mod batch;
pub mod exec;
pub mod xtb;

mod error;

use crate::model::conformer::Conformer;
use crate::model::molecule::Molecule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub use batch::{BatchReport, BatchSummary, Job, JobOutcome, run_batch};
pub use error::Error;
pub use xtb::{OptLevel, XtbConfig, XtbDriver, XtbMethod};

/// Result of one driver call.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOutput {
    pub conformer: Conformer,
    pub energy: Option<f64>,
    pub properties: BTreeMap<String, f64>,
}

pub trait Driver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Runs the tool on one conformer of `mol`.
    fn run(
        &self,
        mol: &Molecule,
        conformer: &Conformer,
        config: &DriverConfig,
    ) -> Result<DriverOutput, Error>;
}

/// Available driver implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Xtb,
}

impl DriverKind {
    pub fn build(&self) -> Box<dyn Driver> {
        match self {
            Self::Xtb => Box::new(XtbDriver),
        }
    }

    /// Executable looked up on `PATH` when none is configured.
    pub fn default_program(&self) -> &'static str {
        match self {
            Self::Xtb => "xtb",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub kind: DriverKind,
    /// Overrides the executable name or path.
    pub executable: Option<String>,
    /// Per-call wall-clock limit in seconds; zero or negative disables it.
    pub timeout_secs: f64,
    /// Worker threads used by [`run_batch`].
    pub workers: usize,
    /// Parent directory for scratch directories.
    pub scratch_root: Option<PathBuf>,
    pub xtb: XtbConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::Xtb,
            executable: None,
            timeout_secs: 3600.0,
            workers: 1,
            scratch_root: None,
            xtb: XtbConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn program(&self) -> String {
        self.executable
            .clone()
            .unwrap_or_else(|| self.kind.default_program().to_owned())
    }

    /// Per-call limit; `None` when disabled or too large to represent.
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs > 0.0 {
            Duration::try_from_secs_f64(self.timeout_secs).ok()
        } else {
            None
        }
    }
}
