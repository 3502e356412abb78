use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use log::{info, trace, warn};

use crate::error::Error;
use crate::models::{
    fjsp::{big_m, BigMPolicy, FjspSolver},
    milp::{MilpBackend, SolveOutcome, SolveParams},
};
use crate::parse::{instance_label, read_instance};
use crate::problem::Instance;
use crate::report::{ResultRecord, Row};
use crate::utils::EPSILON;

/// Solves a list of instances one after the other. A failing instance becomes a
/// `Row::Failed` and never stops the batch.
pub struct BatchDriver<'b, B: MilpBackend> {
    backend: &'b B,
    params: SolveParams,
    policy: BigMPolicy,
    dry_run: bool,
    lp_dir: Option<PathBuf>,
}

impl<'b, B: MilpBackend> BatchDriver<'b, B> {
    pub fn new(backend: &'b B, params: SolveParams) -> Self {
        BatchDriver {
            backend,
            params,
            policy: BigMPolicy::default(),
            dry_run: false,
            lp_dir: None,
        }
    }

    pub fn with_policy(mut self, policy: BigMPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Only build the models and report their size, without solving
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Write every model to `<dir>/<instance stem>.lp` before solving
    pub fn write_lp(mut self, dir: Option<PathBuf>) -> Self {
        self.lp_dir = dir;
        self
    }

    /// One row per path, in the order of `paths`
    pub fn run(&self, paths: &[PathBuf]) -> Vec<Row> {
        let total = paths.len();
        paths
            .iter()
            .enumerate()
            .map(|(k, path)| {
                let label = instance_label(path);
                info!("[{}/{}] -> {} {}", k + 1, total, self.verb(), label);

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.solve_file(path)))
                    .unwrap_or_else(|payload| Err(Error::Solver(panic_message(payload))));

                match outcome {
                    Ok(record) => {
                        info!(
                            "{}: status={} makespan={} gap={} time={:.2}s",
                            label,
                            record.status,
                            record
                                .makespan
                                .map_or_else(|| "-".to_string(), |m| m.to_string()),
                            record.gap.map_or_else(|| "-".to_string(), |g| g.to_string()),
                            record.time_s
                        );
                        Row::Solved(record)
                    }
                    Err(err) => {
                        warn!("{}: {}", label, err);
                        Row::Failed {
                            instance: label,
                            error: err.to_string(),
                        }
                    }
                }
            })
            .collect()
    }

    fn verb(&self) -> &'static str {
        if self.dry_run {
            "Building"
        } else {
            "Solving"
        }
    }

    pub fn solve_file(&self, path: &Path) -> Result<ResultRecord, Error> {
        let instance = read_instance(path)?;
        self.solve(&instance)
    }

    /// Builds, optionally exports and solves the model of `instance`.
    pub fn solve(&self, instance: &Instance) -> Result<ResultRecord, Error> {
        let (mut problem, variables) = FjspSolver::build(instance, self.policy);
        let size = problem.size();

        if let Some(dir) = &self.lp_dir {
            let stem = Path::new(instance.name())
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| instance.name().to_string());
            let path = dir.join(format!("{}.lp", stem));
            problem.write(&path)?;
            info!("Wrote {}", path.display());
        }

        let outcome = if self.dry_run {
            SolveOutcome::not_solved()
        } else {
            trace!("Optimizing {} with {}", problem.name(), self.backend.name());
            self.backend.solve(&mut problem, &self.params)?
        };

        let mut record = ResultRecord::extract(instance, size, &outcome);
        record.schedule = variables.schedule(instance, &outcome);

        if let Some(schedule) = &record.schedule {
            // Leftover integrality tolerance is scaled by the relaxation constant
            let tolerance = EPSILON * big_m::global(instance);
            if let Err(violation) = schedule.validate(instance, tolerance) {
                warn!(
                    "{}: schedule read from the solver is invalid: {}",
                    instance.name(),
                    violation
                );
            }
        }

        Ok(record)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {}", message)
}
