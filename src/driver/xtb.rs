//! Geometry optimisation with the xtb semiempirical package.
//!
//! The conformer goes out as XYZ, `xtb` runs an optimisation in a scratch directory, and the
//! optimised frame comes back through the same atom-signature check used for any XYZ
//! import. The energy is taken from the frame's comment line (`energy: <Eh> gnorm: ...`);
//! summary values printed on stdout are collected as properties.

use super::error::Error;
use super::exec::{self, Invocation};
use super::{Driver, DriverConfig, DriverKind, DriverOutput};
use crate::io;
use crate::model::conformer::Conformer;
use crate::model::molecule::Molecule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

const INPUT_FILE: &str = "input.xyz";
const NAMESPACE: &str = "job";
const OUTPUT_FILE: &str = "job.xtbopt.xyz";
const PLAIN_OUTPUT_FILE: &str = "xtbopt.xyz";

/// Hamiltonian used for the optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XtbMethod {
    #[default]
    Gfn2,
    Gfn1,
    GfnFf,
}

impl XtbMethod {
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Gfn2 => "--gfn2",
            Self::Gfn1 => "--gfn1",
            Self::GfnFf => "--gfnff",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Gfn2 => "gfn2-xtb",
            Self::Gfn1 => "gfn1-xtb",
            Self::GfnFf => "gfn-ff",
        }
    }
}

impl fmt::Display for XtbMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convergence preset passed to `--opt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    Crude,
    Sloppy,
    Loose,
    Lax,
    Normal,
    #[default]
    Tight,
    Vtight,
    Extreme,
}

impl OptLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crude => "crude",
            Self::Sloppy => "sloppy",
            Self::Loose => "loose",
            Self::Lax => "lax",
            Self::Normal => "normal",
            Self::Tight => "tight",
            Self::Vtight => "vtight",
            Self::Extreme => "extreme",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XtbConfig {
    pub method: XtbMethod,
    pub opt_level: OptLevel,
    /// Maximum optimisation cycles.
    pub cycles: u32,
    /// OpenMP threads per xtb process.
    pub threads: usize,
}

impl Default for XtbConfig {
    fn default() -> Self {
        Self {
            method: XtbMethod::Gfn2,
            opt_level: OptLevel::Tight,
            cycles: 200,
            threads: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XtbDriver;

impl XtbDriver {
    /// Builds the call for one optimisation; exposed for inspection and logging.
    pub fn invocation(
        &self,
        mol: &Molecule,
        conformer: &Conformer,
        config: &DriverConfig,
    ) -> Result<Invocation, Error> {
        let mut xyz = Vec::new();
        io::write_xyz_conformer(&mut xyz, mol, conformer, Some(mol.name())).map_err(|e| {
            Error::io(
                "serializing the input geometry",
                std::io::Error::other(e.to_string()),
            )
        })?;

        let xtb = &config.xtb;
        let mut invocation = Invocation::new(config.program())
            .arg(INPUT_FILE)
            .arg(xtb.method.flag())
            .arg("--opt")
            .arg(xtb.opt_level.as_str())
            .arg("--cycles")
            .arg(xtb.cycles.to_string())
            .arg("--namespace")
            .arg(NAMESPACE);

        let charge: i32 = mol.atoms().iter().map(|a| i32::from(a.charge)).sum();
        if charge != 0 {
            invocation = invocation.arg("--chrg").arg(charge.to_string());
        }

        let threads = xtb.threads.max(1).to_string();
        Ok(invocation
            .input(INPUT_FILE, xyz)
            .output(OUTPUT_FILE)
            .output(PLAIN_OUTPUT_FILE)
            .env("OMP_NUM_THREADS", threads.clone())
            .env("MKL_NUM_THREADS", threads)
            .timeout(config.timeout())
            .scratch_root(config.scratch_root.clone()))
    }
}

impl Driver for XtbDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Xtb
    }

    fn run(
        &self,
        mol: &Molecule,
        conformer: &Conformer,
        config: &DriverConfig,
    ) -> Result<DriverOutput, Error> {
        if conformer.len() != mol.atom_count() {
            return Err(crate::model::Error::shape_mismatch(mol.atom_count(), conformer.len()).into());
        }

        let invocation = self.invocation(mol, conformer, config)?;
        let completed = exec::run_command(&invocation)?;
        let program = invocation.program.as_str();

        let text = completed
            .file_text(OUTPUT_FILE)
            .or_else(|| completed.file_text(PLAIN_OUTPUT_FILE))
            .ok_or_else(|| Error::bad_output(program, "no optimized geometry was written"))?;
        let block = io::read_xyz_single(Cursor::new(text))
            .map_err(|e| Error::bad_output(program, e.to_string()))?;

        let mut properties = parse_comment(&block.comment);
        properties.extend(parse_summary(&completed.stdout));
        let energy = properties.get("energy").copied();

        let provenance = format!("xtb:{}", config.xtb.method.label());
        let optimized = block
            .to_conformer(mol, energy, &provenance)
            .map_err(|e| Error::bad_output(program, e.to_string()))?;

        tracing::debug!(
            molecule = mol.name(),
            energy = ?energy,
            elapsed_ms = completed.elapsed.as_millis() as u64,
            "xtb optimisation finished"
        );
        Ok(DriverOutput {
            conformer: optimized,
            energy,
            properties,
        })
    }
}

/// Reads `key: value` pairs with numeric values from an xtb XYZ comment line.
fn parse_comment(comment: &str) -> BTreeMap<String, f64> {
    let tokens: Vec<&str> = comment.split_whitespace().collect();
    tokens
        .windows(2)
        .filter_map(|pair| {
            let key = pair[0].strip_suffix(':')?;
            let value = pair[1].parse::<f64>().ok()?;
            Some((key.to_ascii_lowercase(), value))
        })
        .collect()
}

/// Reads the boxed summary block of xtb's stdout.
fn parse_summary(stdout: &str) -> BTreeMap<String, f64> {
    const LABELS: &[(&str, &str)] = &[
        ("TOTAL ENERGY", "total_energy"),
        ("GRADIENT NORM", "gradient_norm"),
        ("HOMO-LUMO GAP", "homo_lumo_gap"),
    ];

    let mut found = BTreeMap::new();
    for line in stdout.lines() {
        let inner = line.trim().trim_matches('|').trim();
        for (label, key) in LABELS {
            if let Some(rest) = inner.strip_prefix(label)
                && let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse::<f64>().ok())
            {
                found.insert((*key).to_owned(), value);
            }
        }
    }
    found
}
