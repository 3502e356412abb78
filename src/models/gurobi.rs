//! Gurobi as a `MilpBackend`.

use std::collections::HashMap;

use good_lp::{Expression, IntoAffineExpression, Variable};
use grb::prelude::*;
use grb::{attr, param, Env};
use log::{debug, info, warn};

use super::milp::{
    incumbent, MilpBackend, MilpProblem, ModelSize, Sense, SolveOutcome, SolveParams,
    SolverError, Status, Values, VarKind,
};

impl From<grb::Error> for SolverError {
    fn from(err: grb::Error) -> Self {
        SolverError::Failure(err.to_string())
    }
}

/// Owns the Gurobi environment shared by every model of a run.
pub struct GurobiBackend {
    env: Env,
}

impl GurobiBackend {
    /// Starts Gurobi. Fails with `SolverError::Unavailable` if no environment can be
    /// opened, which is usually a missing or expired licence.
    pub fn new() -> Result<GurobiBackend, SolverError> {
        let mut env = Env::new("").map_err(|e| SolverError::Unavailable(e.to_string()))?;
        // Model logging is switched on per model
        env.set(param::OutputFlag, 0)?;
        info!("Gurobi environment ready");
        Ok(GurobiBackend { env })
    }
}

/// The status of a model as reported in the results
pub fn status_from(status: grb::Status) -> Status {
    match status {
        grb::Status::Loaded => Status::NotSolved,
        grb::Status::Optimal => Status::Optimal,
        grb::Status::TimeLimit => Status::TimeLimit,
        grb::Status::Infeasible | grb::Status::InfOrUnbd => Status::Infeasible,
        other => Status::other(&format!("{:?}", other)),
    }
}

fn configure(model: &mut Model, params: &SolveParams) -> Result<(), SolverError> {
    model.set_param(param::OutputFlag, params.log_to_console as i32)?;
    model.set_param(param::TimeLimit, params.time_limit)?;
    if let Some(threads) = params.threads {
        model.set_param(param::Threads, threads as i32)?;
    }
    if let Some(gap) = params.mip_gap {
        model.set_param(param::MIPGap, gap)?;
    }
    Ok(())
}

impl MilpBackend for GurobiBackend {
    fn name(&self) -> &'static str {
        "gurobi"
    }

    fn solve(
        &self,
        problem: &mut MilpProblem,
        params: &SolveParams,
    ) -> Result<SolveOutcome, SolverError> {
        let mut model = Model::with_env(problem.name(), &self.env)?;
        configure(&mut model, params)?;

        let mut vars: HashMap<Variable, grb::Var> = HashMap::new();
        for (var, info) in problem.columns() {
            let vtype = match info.kind {
                VarKind::Binary => VarType::Binary,
                VarKind::Continuous { .. } => VarType::Continuous,
            };
            let (lb, ub) = info.kind.bounds();
            let column = model.add_var(&info.name, vtype, 0.0, lb, ub, std::iter::empty())?;
            vars.insert(*var, column);
        }

        let linear = |expr: &Expression| -> Expr {
            problem
                .terms(expr)
                .into_iter()
                .map(|(v, c)| c * vars[&v])
                .grb_sum()
        };

        for (name, constr) in problem.constraints() {
            let lhs = linear(&constr.expr);
            let rhs = constr.rhs();
            let ineq = match constr.sense {
                Sense::Less => c!(lhs <= rhs),
                Sense::Greater => c!(lhs >= rhs),
                Sense::Equal => c!(lhs == rhs),
            };
            model.add_constr(name, ineq)?;
        }

        let objective = linear(problem.objective()) + problem.objective().constant();
        model.set_objective(objective, ModelSense::Minimize)?;
        model.update()?;

        let size = ModelSize::from_counts(
            model.get_attr(attr::NumVars)? as usize,
            model.get_attr(attr::NumIntVars)? as usize,
            model.get_attr(attr::NumBinVars)? as usize,
            model.get_attr(attr::NumConstrs)? as usize,
        );
        if size != problem.size() {
            warn!(
                "{}: Gurobi holds {:?}, built {:?}",
                problem.name(),
                size,
                problem.size()
            );
        }

        model.optimize()?;

        let status = status_from(model.status()?);
        let solutions = model.get_attr(attr::SolCount)? as usize;
        debug!("{}: {} with {} solutions", problem.name(), status, solutions);

        let objective = incumbent(solutions, || Ok(model.get_attr(attr::ObjVal)?))?;
        let gap = incumbent(solutions, || Ok(model.get_attr(attr::MIPGap)?))?
            .filter(|g| g.is_finite());
        let values = incumbent(solutions, || {
            let mut values = Values::with_capacity(vars.len());
            for (var, column) in &vars {
                values.insert(*var, model.get_obj_attr(attr::X, column)?);
            }
            Ok(values)
        })?;

        Ok(SolveOutcome {
            status,
            objective,
            gap,
            runtime: model.get_attr(attr::Runtime)?,
            values,
        })
    }
}
