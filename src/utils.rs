/// Absolute tolerance when comparing times read back from a solver
pub const EPSILON: f64 = 1e-5;
