//! External process supervision for qlagent.

pub mod runner;

pub use runner::{CommandRunner, FatalMarkers, RunnerConfig, RunnerError};
