use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use log::{error, info, warn};

use fjsp_milp::models::{
    fjsp::BigMPolicy,
    milp::{MilpBackend, SolveParams},
    HighsBackend, Unavailable,
};
use fjsp_milp::parse::find_instances;
use fjsp_milp::report::{write_file, ReportPaths, Row};
use fjsp_milp::BatchDriver;

/// The MILP engine that solves the models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Solver {
    Highs,
    Gurobi,
}

impl FromStr for Solver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "highs" => Ok(Solver::Highs),
            "gurobi" => Ok(Solver::Gurobi),
            other => Err(format!("unknown solver '{}', expected 'highs' or 'gurobi'", other)),
        }
    }
}

#[derive(Debug, clap::Parser)]
#[clap(about = "Solves flexible job-shop instances as MILPs and tabulates the results")]
struct Args {
    /// An instance file, or a directory searched recursively for instance files
    #[clap(long)]
    root: PathBuf,
    /// MILP solver: highs (bundled) or gurobi (needs the `gurobi` feature and a licence)
    #[clap(long, default_value = "highs")]
    solver: Solver,
    /// Time limit of each solve, in seconds
    #[clap(long, default_value_t = 3600.0)]
    time_limit: f64,
    /// Number of solver threads (defaults to the solver's choice)
    #[clap(long)]
    threads: Option<u32>,
    /// Relative optimality gap at which a solve may stop
    #[clap(long)]
    mip_gap: Option<f64>,
    /// Only process the first N instances found. 0 means all.
    #[clap(long)]
    max_instances: Option<usize>,
    /// Report path. The Markdown (and JSON) reports are written next to it.
    #[clap(long, default_value = "results_fattahi.csv")]
    out: PathBuf,
    /// Keep only instances whose path contains this text, if any does. Empty to keep all.
    #[clap(long, default_value = "fattahi")]
    prefer: String,
    /// Relaxation constant of the disjunctive constraints: global or per-machine
    #[clap(long, default_value = "global")]
    big_m: BigMPolicy,
    /// Build the models and report their size without solving
    #[clap(long)]
    dry_run: bool,
    /// Write each model in LP format to this directory
    #[clap(long)]
    write_lp: Option<PathBuf>,
    /// Also write the results as JSON
    #[clap(long)]
    json: bool,
    /// Write the schedules of all solved instances as JSON to this file
    #[clap(long)]
    schedules: Option<PathBuf>,
    /// Show the solver's own log
    #[clap(long)]
    solver_log: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let prefer = Some(args.prefer.as_str()).filter(|p| !p.is_empty());
    let mut files = find_instances(&args.root, prefer)?;
    if let Some(n) = args.max_instances.filter(|&n| n > 0) {
        files.truncate(n);
    }
    info!("Found {} instances below {}", files.len(), args.root.display());

    if let Some(dir) = &args.write_lp {
        std::fs::create_dir_all(dir)?;
    }

    let params = SolveParams {
        time_limit: args.time_limit,
        threads: args.threads,
        mip_gap: args.mip_gap,
        log_to_console: args.solver_log,
    };

    // A dry run never reaches the solver, so it needs no licence either
    let rows = match args.solver {
        Solver::Highs => solve_all(&HighsBackend, args, params, &files),
        Solver::Gurobi if args.dry_run => solve_all(&HighsBackend, args, params, &files),
        Solver::Gurobi => solve_with_gurobi(args, params, &files),
    };

    let paths = ReportPaths::new(&args.out, args.json);
    paths.write(&rows)?;

    if let Some(path) = &args.schedules {
        let schedules: Vec<_> = rows
            .iter()
            .filter_map(Row::record)
            .filter_map(|record| record.schedule.as_ref())
            .collect();
        write_file(path, |w| {
            serde_json::to_writer_pretty(w, &schedules)?;
            Ok(())
        })?;
    }

    let failures = rows.iter().filter(|row| row.is_failure()).count();
    info!(
        "Done: {} instances, {} failed. Results in {} and {}",
        rows.len(),
        failures,
        paths.csv.display(),
        paths.markdown.display()
    );

    Ok(())
}

fn solve_all<B: MilpBackend>(
    backend: &B,
    args: &Args,
    params: SolveParams,
    files: &[PathBuf],
) -> Vec<Row> {
    BatchDriver::new(backend, params)
        .with_policy(args.big_m)
        .dry_run(args.dry_run)
        .write_lp(args.write_lp.clone())
        .run(files)
}

#[cfg(feature = "gurobi")]
fn solve_with_gurobi(args: &Args, params: SolveParams, files: &[PathBuf]) -> Vec<Row> {
    use fjsp_milp::models::{gurobi::GurobiBackend, milp::SolverError};

    match GurobiBackend::new() {
        Ok(backend) => solve_all(&backend, args, params, files),
        Err(err) => {
            warn!("{}", err);
            let reason = match err {
                SolverError::Unavailable(reason) | SolverError::Failure(reason) => reason,
            };
            solve_all(&Unavailable::new(reason), args, params, files)
        }
    }
}

#[cfg(not(feature = "gurobi"))]
fn solve_with_gurobi(args: &Args, params: SolveParams, files: &[PathBuf]) -> Vec<Row> {
    let reason = "built without the `gurobi` feature";
    warn!("Gurobi is not available: {}", reason);
    solve_all(&Unavailable::new(reason), args, params, files)
}
