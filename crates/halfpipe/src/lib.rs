//! halfpipe command line
//!
//! Finds the `.halfpipe.io` manifest, lints it against the working copy it
//! lives in, and prints the pipeline rendered for its platform.
//!
//! The pieces are exposed as a library so they can be driven without a
//! process: [`cli`] parses arguments, [`project`] loads the manifest,
//! [`collaborators`] answers filesystem and git questions for the linters,
//! and [`commands`] runs `lint` or `render` into an [`commands::Output`].

pub mod cli;
pub mod collaborators;
pub mod commands;
pub mod project;
pub mod tracing;

pub use cli::{Cli, CliError, Commands};
pub use commands::{Output, execute};
