use std::collections::HashMap;

use derive_more::Display;
use good_lp::{
    constraint, variable, Constraint, Expression, IntoAffineExpression, ProblemVariables,
    ResolutionError, Variable,
};
use serde::{Serialize, Serializer};

/// Values of the variables of a problem, e.g. the incumbent of a solve.
pub type Values = HashMap<Variable, f64>;

/// The domain of a variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Continuous { lb: f64, ub: f64 },
}

impl VarKind {
    /// A continuous variable in `[0, inf)`
    pub fn non_negative() -> VarKind {
        VarKind::Continuous {
            lb: 0.0,
            ub: f64::INFINITY,
        }
    }

    pub fn bounds(self) -> (f64, f64) {
        match self {
            VarKind::Binary => (0.0, 1.0),
            VarKind::Continuous { lb, ub } => (lb, ub),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub name: String,
    pub kind: VarKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Sense {
    #[display(fmt = "<=")]
    Less,
    #[display(fmt = ">=")]
    Greater,
    #[display(fmt = "=")]
    Equal,
}

/// A linear constraint kept in the form `expr <sense> 0`, with `expr = lhs - rhs`.
#[derive(Debug, Clone)]
pub struct Constr {
    pub expr: Expression,
    pub sense: Sense,
}

impl Constr {
    pub fn new<L, R>(lhs: L, sense: Sense, rhs: R) -> Constr
    where
        L: IntoAffineExpression,
        R: IntoAffineExpression,
    {
        Constr {
            expr: lhs.into_expression() - rhs,
            sense,
        }
    }

    /// `lhs >= rhs`
    pub fn ge(lhs: impl IntoAffineExpression, rhs: impl IntoAffineExpression) -> Constr {
        Constr::new(lhs, Sense::Greater, rhs)
    }

    /// `lhs <= rhs`
    pub fn le(lhs: impl IntoAffineExpression, rhs: impl IntoAffineExpression) -> Constr {
        Constr::new(lhs, Sense::Less, rhs)
    }

    /// `lhs == rhs`
    pub fn eq(lhs: impl IntoAffineExpression, rhs: impl IntoAffineExpression) -> Constr {
        Constr::new(lhs, Sense::Equal, rhs)
    }

    /// The right-hand side once every variable is moved to the left
    pub fn rhs(&self) -> f64 {
        // Subtracting from 0.0 avoids printing -0
        0.0 - self.expr.constant()
    }

    /// The coefficient of `var` on the left-hand side
    pub fn coefficient(&self, var: Variable) -> f64 {
        coefficients(&self.expr)
            .find(|&(v, _)| v == var)
            .map_or(0.0, |(_, c)| c)
    }

    /// How far `values` is from violating the constraint. Negative when violated.
    pub fn slack(&self, values: &Values) -> f64 {
        let lhs = evaluate(&self.expr, values);
        match self.sense {
            Sense::Less => -lhs,
            Sense::Greater => lhs,
            Sense::Equal => -lhs.abs(),
        }
    }

    /// The constraint as handed to a `good_lp` solver
    pub fn to_constraint(&self) -> Constraint {
        let expr = self.expr.clone();
        match self.sense {
            Sense::Less => constraint!(expr <= 0.0),
            Sense::Greater => constraint!(expr >= 0.0),
            Sense::Equal => constraint!(expr == 0.0),
        }
    }

    /// The largest coefficient magnitude, at least 1
    fn scale(&self) -> f64 {
        coefficients(&self.expr).fold(1.0, |acc, (_, c)| acc.max(c.abs()))
    }
}

fn coefficients(expr: &Expression) -> impl Iterator<Item = (Variable, f64)> {
    expr.clone().linear_coefficients().into_iter()
}

/// Evaluates `expr`. Variables without a value count as 0.
pub fn evaluate(expr: &Expression, values: &Values) -> f64 {
    coefficients(expr)
        .map(|(v, c)| c * values.get(&v).copied().unwrap_or(0.0))
        .sum::<f64>()
        + expr.constant()
}

/// The first restriction of a problem violated by a set of values.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Violation {
    #[display(fmt = "{} has no value", name)]
    Missing { name: String },
    #[display(fmt = "{} = {} is outside its bounds", name, value)]
    Bounds { name: String, value: f64 },
    #[display(fmt = "{} = {} is not integral", name, value)]
    Integrality { name: String, value: f64 },
    #[display(fmt = "constraint {} is violated by {}", name, amount)]
    Constraint { name: String, amount: f64 },
}

/// The number of variables and constraints of a problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelSize {
    pub binaries: usize,
    pub continuous: usize,
    pub constraints: usize,
}

impl ModelSize {
    /// From the counts a solver reports, where `integers` includes the binaries.
    pub fn from_counts(vars: usize, integers: usize, binaries: usize, constraints: usize) -> Self {
        ModelSize {
            binaries,
            continuous: vars.saturating_sub(integers),
            constraints,
        }
    }
}

/// A minimisation problem under construction: `good_lp` variables, named
/// constraints and an objective.
pub struct MilpProblem {
    name: String,
    vars: ProblemVariables,
    /// Every variable, in the order of creation
    columns: Vec<(Variable, VarInfo)>,
    positions: HashMap<Variable, usize>,
    rows: Vec<(String, Constr)>,
    objective: Expression,
    handed_off: bool,
}

impl MilpProblem {
    pub fn new(name: &str) -> MilpProblem {
        MilpProblem {
            name: name.to_string(),
            vars: ProblemVariables::new(),
            columns: Vec::new(),
            positions: HashMap::new(),
            rows: Vec::new(),
            objective: Expression::from(0.0),
            handed_off: false,
        }
    }

    /// The label the problem was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_var(&mut self, name: &str, kind: VarKind) -> Variable {
        let definition = match kind {
            VarKind::Binary => variable().binary(),
            VarKind::Continuous { lb, ub } if ub.is_finite() => variable().min(lb).max(ub),
            VarKind::Continuous { lb, .. } => variable().min(lb),
        };
        let var = self.vars.add(definition.name(name));

        self.positions.insert(var, self.columns.len());
        self.columns.push((
            var,
            VarInfo {
                name: name.to_string(),
                kind,
            },
        ));
        var
    }

    pub fn add_binary(&mut self, name: &str) -> Variable {
        self.add_var(name, VarKind::Binary)
    }

    /// A continuous variable with lower bound `lb` and no upper bound
    pub fn add_continuous(&mut self, name: &str, lb: f64) -> Variable {
        self.add_var(
            name,
            VarKind::Continuous {
                lb,
                ub: f64::INFINITY,
            },
        )
    }

    pub fn add_constr(&mut self, name: &str, constr: Constr) {
        self.rows.push((name.to_string(), constr));
    }

    pub fn minimise(&mut self, objective: impl IntoAffineExpression) {
        self.objective = objective.into_expression();
    }

    pub fn objective(&self) -> &Expression {
        &self.objective
    }

    pub fn columns(&self) -> &[(Variable, VarInfo)] {
        &self.columns
    }

    pub fn var_name(&self, var: Variable) -> &str {
        self.positions
            .get(&var)
            .map_or("?", |&k| self.columns[k].1.name.as_str())
    }

    /// All constraints with their names, in the order they were added
    pub fn constraints(&self) -> &[(String, Constr)] {
        &self.rows
    }

    pub fn constraint(&self, name: &str) -> Option<&Constr> {
        self.rows
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, constr)| constr)
    }

    /// The non-zero terms of `expr`, in the order the variables were created
    pub fn terms(&self, expr: &Expression) -> Vec<(Variable, f64)> {
        let mut terms: Vec<(Variable, f64)> =
            coefficients(expr).filter(|&(_, c)| c != 0.0).collect();
        terms.sort_by_key(|(v, _)| self.positions.get(v).copied().unwrap_or(usize::MAX));
        terms
    }

    pub fn size(&self) -> ModelSize {
        let binaries = self
            .columns
            .iter()
            .filter(|(_, info)| info.kind == VarKind::Binary)
            .count();

        ModelSize {
            binaries,
            continuous: self.columns.len() - binaries,
            constraints: self.rows.len(),
        }
    }

    /// Checks `values` against bounds, integrality and every constraint. Constraints
    /// get `tolerance` of slack per unit of their largest coefficient.
    pub fn check(&self, values: &Values, tolerance: f64) -> Result<(), Violation> {
        for (var, info) in &self.columns {
            let value = *values.get(var).ok_or_else(|| Violation::Missing {
                name: info.name.clone(),
            })?;
            let (lb, ub) = info.kind.bounds();
            if value < lb - tolerance || value > ub + tolerance {
                return Err(Violation::Bounds {
                    name: info.name.clone(),
                    value,
                });
            }
            if info.kind == VarKind::Binary && (value - value.round()).abs() > tolerance {
                return Err(Violation::Integrality {
                    name: info.name.clone(),
                    value,
                });
            }
        }

        for (name, constr) in &self.rows {
            let slack = constr.slack(values);
            if slack < -tolerance * constr.scale() {
                return Err(Violation::Constraint {
                    name: name.clone(),
                    amount: -slack,
                });
            }
        }

        Ok(())
    }

    /// Moves the variables, objective and constraints out for a `good_lp` solver.
    /// Names, bounds and constraints stay readable afterwards, so a solution can be
    /// checked against them, but the problem cannot be handed off twice.
    pub fn hand_off(
        &mut self,
    ) -> Result<(ProblemVariables, Expression, Vec<Constraint>), SolverError> {
        if self.handed_off {
            return Err(SolverError::Failure(format!(
                "{} was already handed to a solver",
                self.name
            )));
        }
        self.handed_off = true;

        let vars = std::mem::replace(&mut self.vars, ProblemVariables::new());
        let constraints = self.rows.iter().map(|(_, c)| c.to_constraint()).collect();
        Ok((vars, self.objective.clone(), constraints))
    }
}

/// The terminal state of a solve
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Status {
    /// The problem was only built
    #[display(fmt = "not_solved")]
    NotSolved,
    #[display(fmt = "optimal")]
    Optimal,
    #[display(fmt = "time_limit")]
    TimeLimit,
    #[display(fmt = "infeasible")]
    Infeasible,
    /// Any other solver state, by name
    #[display(fmt = "{}", _0)]
    Other(String),
}

impl Status {
    /// A solver state without a dedicated variant, e.g. `NodeLimit` becomes `nodelimit`
    pub fn other(name: &str) -> Status {
        Status::Other(name.to_lowercase())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// What a solve produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: Status,
    /// Objective value of the incumbent, if there is one
    pub objective: Option<f64>,
    /// Relative gap of the incumbent, if the solver reports one
    pub gap: Option<f64>,
    /// Seconds spent solving
    pub runtime: f64,
    /// The incumbent, if there is one
    pub values: Option<Values>,
}

impl SolveOutcome {
    /// The outcome of a problem that was never solved
    pub fn not_solved() -> SolveOutcome {
        SolveOutcome::without_incumbent(Status::NotSolved, 0.0)
    }

    pub fn without_incumbent(status: Status, runtime: f64) -> SolveOutcome {
        SolveOutcome {
            status,
            objective: None,
            gap: None,
            runtime,
            values: None,
        }
    }

    /// The value of `var` in the incumbent
    pub fn value(&self, var: Variable) -> Option<f64> {
        self.values.as_ref().and_then(|values| values.get(&var).copied())
    }
}

/// Reads the incumbent with `read` when the solver holds at least one solution.
pub fn incumbent<T, F>(solutions: usize, read: F) -> Result<Option<T>, SolverError>
where
    F: FnOnce() -> Result<T, SolverError>,
{
    if solutions == 0 {
        Ok(None)
    } else {
        read().map(Some)
    }
}

/// Solver configuration shared by every model of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveParams {
    /// Wall-clock limit of a single solve, in seconds
    pub time_limit: f64,
    /// Number of solver threads. `None` lets the solver decide.
    pub threads: Option<u32>,
    /// Relative optimality gap at which the solver may stop
    pub mip_gap: Option<f64>,
    /// Forward the solver's own log to the console
    pub log_to_console: bool,
}

impl Default for SolveParams {
    fn default() -> Self {
        SolveParams {
            time_limit: 3600.0,
            threads: None,
            mip_gap: None,
            log_to_console: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SolverError {
    /// The solving engine cannot be reached, e.g. missing binding or licence
    #[display(fmt = "solver unavailable: {}", _0)]
    Unavailable(String),
    /// Any other failure reported by the engine
    #[display(fmt = "{}", _0)]
    Failure(String),
}

impl std::error::Error for SolverError {}

impl From<ResolutionError> for SolverError {
    fn from(err: ResolutionError) -> Self {
        SolverError::Failure(err.to_string())
    }
}

/// A MILP solving engine.
pub trait MilpBackend {
    fn name(&self) -> &'static str;

    /// Minimises `problem` within the limits of `params`. Blocks for at most the time limit.
    fn solve(
        &self,
        problem: &mut MilpProblem,
        params: &SolveParams,
    ) -> Result<SolveOutcome, SolverError>;
}

/// Stands in for a solving engine that failed its availability check. Every
/// solve reports the reason.
#[derive(Debug, Clone)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Unavailable {
        Unavailable {
            reason: reason.into(),
        }
    }
}

impl MilpBackend for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn solve(&self, _: &mut MilpProblem, _: &SolveParams) -> Result<SolveOutcome, SolverError> {
        Err(SolverError::Unavailable(self.reason.clone()))
    }
}
