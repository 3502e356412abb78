pub mod big_m;
pub mod model;
pub mod sets_and_parameters;

pub use big_m::BigMPolicy;
pub use model::{FjspSolver, Variables};
