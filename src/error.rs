use std::path::Path;

use derive_more::{Display, From};

use crate::{models::milp::SolverError, parse::FormatError};

/// Everything that can go wrong while reading, building or solving a single instance.
#[derive(Debug, Display, From)]
pub enum Error {
    /// The instance file could not be read
    #[display(fmt = "could not read {}: {}", path, message)]
    #[from(ignore)]
    Io { path: String, message: String },
    /// The instance file is malformed
    #[display(fmt = "{}", _0)]
    Format(FormatError),
    /// No MILP solving engine can be reached (missing binding or licence)
    #[display(fmt = "solver unavailable: {}", _0)]
    #[from(ignore)]
    SolverUnavailable(String),
    /// Any other failure while building or solving the model
    #[display(fmt = "solver failure: {}", _0)]
    #[from(ignore)]
    Solver(String),
}

impl std::error::Error for Error {}

impl Error {
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Error::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<SolverError> for Error {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::Unavailable(reason) => Error::SolverUnavailable(reason),
            SolverError::Failure(message) => Error::Solver(message),
        }
    }
}
