#[macro_use]
pub mod diagnostics;

pub use crate::diagnostics::{ErrorType, SampleError};

pub mod cancel;
pub mod caserunner;
pub mod cli;
pub mod environment;
pub mod plan;
pub mod runner;
pub mod snippet;
pub mod summary;
