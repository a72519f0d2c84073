//! Subprocess-backed execution of user submissions against test cases.
//!
//! The crate is split along the same seams as the request lifecycle:
//! - `config`: which languages exist and how to launch them
//! - `harness`: wrapping user code so it prints one JSON line
//! - `runner`: one temp file, one child process, one hard timeout
//! - `engine`: drives the runner over every test case, in order
//! - `evaluator`: turns raw runner output into pass/fail outcomes
//! - `executor`: glue used by the API and the CLI

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod harness;
pub mod runner;


pub use config::{LanguageProfile, LanguageRegistry};
pub use error::SandboxError;
pub use executor::CodeExecutor;
pub use runner::{ProcessRunner, RunOutput, SubprocessRunner};
