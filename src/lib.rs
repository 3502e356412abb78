pub mod batch;
pub mod error;
pub mod models;
pub mod parse;
pub mod problem;
pub mod report;
pub mod solution;
pub mod utils;

#[cfg(test)]
mod testing;

pub use batch::BatchDriver;
pub use error::Error;
pub use problem::Instance;
pub use report::{ResultRecord, Row};
