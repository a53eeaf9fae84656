#![deny(missing_docs)]
//! The `gramtex` command line: wires the correction pipeline to a model
//! backend, the change log and the output files.

/// Completion backends for the pipeline.
pub mod adapters;
/// Subcommand implementations.
pub mod app;
/// Command-line definition.
pub mod cli;
/// Error types for the binary.
pub mod errors;
/// Console and file logging.
pub mod logging;
/// Output paths and file writing.
pub mod output;

pub use errors::AppError;
