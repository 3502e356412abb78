//! The default backend: HiGHS through `good_lp`.

use std::time::Instant;

use good_lp::{default_solver, ResolutionError, Solution, SolverModel};
use log::{debug, warn};

use super::milp::{
    evaluate, MilpBackend, MilpProblem, SolveOutcome, SolveParams, SolverError, Status, Values,
};

/// Integer and primal feasibility are checked with this tolerance per unit of
/// the largest coefficient of each constraint
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend;

impl MilpBackend for HighsBackend {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(
        &self,
        problem: &mut MilpProblem,
        params: &SolveParams,
    ) -> Result<SolveOutcome, SolverError> {
        let (vars, objective, constraints) = problem.hand_off()?;

        let mut model = vars
            .minimise(objective)
            .using(default_solver)
            .set_option("output_flag", params.log_to_console)
            .set_option("time_limit", params.time_limit);
        if let Some(threads) = params.threads {
            model = model.set_option("threads", threads as i32);
        }
        if let Some(gap) = params.mip_gap {
            model = model.set_option("mip_rel_gap", gap);
        }
        for constraint in constraints {
            model.add_constraint(constraint);
        }
        debug!("{}: handed to HiGHS with {:?}", problem.name(), params);

        let start = Instant::now();
        let result = model.solve();
        let runtime = start.elapsed().as_secs_f64();

        let solution = match result {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => {
                return Ok(SolveOutcome::without_incumbent(Status::Infeasible, runtime))
            }
            Err(ResolutionError::Unbounded) => {
                return Ok(SolveOutcome::without_incumbent(
                    Status::other("unbounded"),
                    runtime,
                ))
            }
            Err(err) if runtime >= params.time_limit => {
                debug!("{}: stopped at the time limit: {}", problem.name(), err);
                return Ok(SolveOutcome::without_incumbent(Status::TimeLimit, runtime));
            }
            Err(err) => return Err(err.into()),
        };

        let values: Values = problem
            .columns()
            .iter()
            .map(|&(var, _)| (var, solution.value(var)))
            .collect();

        Ok(outcome(problem, params, values, runtime))
    }
}

/// Classifies what HiGHS returned. A stop at the time limit is recognised by the
/// elapsed time, and values that break the problem are not an incumbent.
fn outcome(
    problem: &MilpProblem,
    params: &SolveParams,
    values: Values,
    runtime: f64,
) -> SolveOutcome {
    let timed_out = runtime >= params.time_limit;
    let status = if timed_out {
        Status::TimeLimit
    } else {
        Status::Optimal
    };

    if let Err(violation) = problem.check(&values, FEASIBILITY_TOLERANCE) {
        if !timed_out {
            warn!(
                "{}: solution returned by HiGHS is infeasible: {}",
                problem.name(),
                violation
            );
        }
        let status = if timed_out {
            status
        } else {
            Status::other("no_incumbent")
        };
        return SolveOutcome::without_incumbent(status, runtime);
    }

    // HiGHS only proves optimality within the requested gap, which good_lp does not report
    let gap = (status == Status::Optimal && params.mip_gap.is_none()).then(|| 0.0);

    SolveOutcome {
        status,
        objective: Some(evaluate(problem.objective(), &values)),
        gap,
        runtime,
        values: Some(values),
    }
}
