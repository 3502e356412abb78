use std::{collections::BTreeMap, fmt::Display};

use good_lp::Variable;
use typed_index_collections::TiVec;

use super::milp::{MilpProblem, SolveOutcome, VarKind};

/// A key that identifies one variable of an indexed family, e.g. `(machine, operation)`.
pub trait VarKey: Copy + Ord {
    /// The index part of the variable name, e.g. `3_14` for `(3, 14)`
    fn suffix(&self) -> String;
}

impl<A, B> VarKey for (A, B)
where
    A: Display + Copy + Ord,
    B: Display + Copy + Ord,
{
    fn suffix(&self) -> String {
        format!("{}_{}", self.0, self.1)
    }
}

impl<A, B, C> VarKey for (A, B, C)
where
    A: Display + Copy + Ord,
    B: Display + Copy + Ord,
    C: Display + Copy + Ord,
{
    fn suffix(&self) -> String {
        format!("{}_{}_{}", self.0, self.1, self.2)
    }
}

pub trait AddVars {
    type Out;

    /// Create a family of variables of any kind
    fn vars(&self, problem: &mut MilpProblem, base_name: &str, kind: VarKind) -> Self::Out;

    /// Binary variables
    fn binary(&self, problem: &mut MilpProblem, base_name: &str) -> Self::Out {
        self.vars(problem, base_name, VarKind::Binary)
    }

    /// Continuous non-negative variables
    fn cont(&self, problem: &mut MilpProblem, base_name: &str) -> Self::Out {
        self.vars(problem, base_name, VarKind::non_negative())
    }
}

/// `n` dense variables named `base_0 .. base_{n-1}`
impl AddVars for usize {
    type Out = Vec<Variable>;

    fn vars(&self, problem: &mut MilpProblem, base_name: &str, kind: VarKind) -> Self::Out {
        (0..*self)
            .map(|i| problem.add_var(&format!("{}_{}", base_name, i), kind))
            .collect()
    }
}

/// One variable per key, created in the order of the slice
impl<K: VarKey> AddVars for [K] {
    type Out = BTreeMap<K, Variable>;

    fn vars(&self, problem: &mut MilpProblem, base_name: &str, kind: VarKind) -> Self::Out {
        self.iter()
            .map(|key| {
                let name = format!("{}_{}", base_name, key.suffix());
                (*key, problem.add_var(&name, kind))
            })
            .collect()
    }
}

/// Trait that reads the incumbent values of variables
pub trait ConvertVars {
    type Out;
    fn convert(&self, outcome: &SolveOutcome) -> Self::Out;
}

impl ConvertVars for Variable {
    type Out = Option<f64>;

    fn convert(&self, outcome: &SolveOutcome) -> Self::Out {
        outcome.value(*self)
    }
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, outcome: &SolveOutcome) -> Self::Out {
        self.iter().map(|e| e.convert(outcome)).collect()
    }
}

impl<K: From<usize>, T: ConvertVars> ConvertVars for TiVec<K, T> {
    type Out = TiVec<K, T::Out>;

    fn convert(&self, outcome: &SolveOutcome) -> Self::Out {
        self.iter().map(|e| e.convert(outcome)).collect()
    }
}

impl<K: Ord + Copy, T: ConvertVars> ConvertVars for BTreeMap<K, T> {
    type Out = BTreeMap<K, T::Out>;

    fn convert(&self, outcome: &SolveOutcome) -> Self::Out {
        self.iter().map(|(k, e)| (*k, e.convert(outcome))).collect()
    }
}
