//! Sanador CLI Library
//!
//! Command-line interface for the Sanar self-healing engine: inspect and
//! reset the heal store, read the healed-step audit log, check oracle output
//! against the repair grammar, patch a source line, and run described steps
//! against a live page.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)] // String building is clear and correct
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    AnalyzeArgs, Cli, ColorArg, Commands, LogArgs, LogCommand, OutputArg, PatchArgs,
    RepairCheckArgs, StoreArgs, StoreCommand,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{pad, OutputFormat, Reporter};
