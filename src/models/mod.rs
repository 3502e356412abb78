pub mod fjsp;
#[cfg(feature = "gurobi")]
pub mod gurobi;
pub mod highs;
pub mod lp_file;
pub mod milp;
pub mod utils;

#[cfg(feature = "gurobi")]
pub use gurobi::GurobiBackend;
pub use highs::HighsBackend;
pub use milp::{
    MilpBackend, MilpProblem, SolveOutcome, SolveParams, SolverError, Status, Unavailable,
};
