//! Manifest linting for halfpipe
//!
//! A [`Linter`] checks one concern of a [`halfpipe_core::Manifest`] and
//! returns a [`LintResult`] holding errors and warnings. [`LintRunner`]
//! runs a fixed, ordered list of linters and collects their results into
//! [`LintResults`]; any error there means the manifest must not be rendered.
//!
//! Linters that need to look outside the manifest (files next to it, the
//! git working copy, CF application manifests) go through the traits in
//! [`collaborators`]. The [`memory`] module has in-memory implementations.
//!
//! # Example
//!
//! ```ignore
//! use halfpipe_lint::{LintRunner, memory};
//!
//! let runner = LintRunner::standard(&config, &memory::collaborators(files, git, inventory));
//! let results = runner.run(&manifest);
//! if results.has_errors() {
//!     eprintln!("{}", results.render(&config.doc_host));
//! }
//! ```

pub mod collaborators;
pub mod error;
pub mod linter;
pub mod linters;
pub mod memory;
pub mod result;

pub use collaborators::{
    Application, CollaboratorError, Collaborators, DeployInventory, FileIssue, FileProbe,
    GitMetadata,
};
pub use error::LintError;
pub use linter::{LintRunner, Linter};
pub use result::{LintResult, LintResults};
