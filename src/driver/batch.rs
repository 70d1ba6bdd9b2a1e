use super::{Driver, DriverConfig, DriverOutput, Error};
use crate::model::conformer::Conformer;
use crate::model::molecule::Molecule;
use crate::utils::parallel::*;
use std::fmt;

/// One unit of work for [`run_batch`].
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub label: &'a str,
    pub molecule: &'a Molecule,
    pub conformer: &'a Conformer,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub label: String,
    pub result: Result<DriverOutput, Error>,
}

/// Per-job outcomes in submission order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(_) => summary.succeeded += 1,
                Err(e) if e.is_timeout() => summary.timed_out += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &DriverOutput)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|out| (o.label.as_str(), out)))
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} timed out, {} failed",
            self.succeeded, self.timed_out, self.failed
        )
    }
}

/// Runs every job on a pool of `config.workers` threads.
///
/// A failing job never aborts the batch and nothing is retried; each outcome is reported
/// individually, in the order the jobs were given.
pub fn run_batch(driver: &dyn Driver, jobs: &[Job<'_>], config: &DriverConfig) -> BatchReport {
    let run = || -> Vec<JobOutcome> {
        jobs.par_iter()
            .map(|job| {
                let result = driver.run(job.molecule, job.conformer, config);
                match &result {
                    Ok(output) => {
                        tracing::debug!(job = job.label, energy = ?output.energy, "driver job succeeded");
                    }
                    Err(e) => {
                        tracing::warn!(job = job.label, error = %e, "driver job failed");
                    }
                }
                JobOutcome {
                    label: job.label.to_owned(),
                    result,
                }
            })
            .collect()
    };

    #[cfg(feature = "parallel")]
    let outcomes = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            tracing::warn!(error = %e, "could not build a driver pool, using the global pool");
            run()
        }
    };
    #[cfg(not(feature = "parallel"))]
    let outcomes = run();

    let report = BatchReport { outcomes };
    tracing::info!(kind = ?driver.kind(), summary = %report.summary(), "driver batch finished");
    report
}
