//! Rendering halfpipe manifests into CI configuration
//!
//! This crate holds the parts every backend shares:
//!
//! - [`Renderer`]: lowers a linted, defaulted [`halfpipe_core::Manifest`]
//!   into a backend graph and serializes it with a version header.
//! - [`naming`]: unique job/resource names and the `passed`/`needs` wiring
//!   between jobs.
//! - [`convert`]: task kinds that both backends run as a plain script.
//! - [`Compiler`]: lint, default, render.
//!
//! # Example
//!
//! ```ignore
//! use halfpipe_render::Compiler;
//!
//! let compiler = Compiler::new(renderer, LintRunner::standard(&config, &collaborators));
//! let compilation = compiler.compile(&manifest)?;
//! print!("{}", compilation.results.render(&config.doc_host));
//! if let Some(pipeline) = compilation.output {
//!     std::fs::write("pipeline.yml", pipeline)?;
//! }
//! ```

pub mod compiler;
pub mod convert;
pub mod error;
pub mod naming;
pub mod renderer;

pub use compiler::{Compilation, Compiler};
pub use error::{RenderError, RenderResult};
pub use naming::{JobIndex, NameRegistry, unique_name};
pub use renderer::{Renderer, check_task_tree, header, serialize};
