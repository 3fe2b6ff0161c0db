//! GitHub Actions backend for halfpipe
//!
//! Renders a linted, defaulted [`halfpipe_core::Manifest`] into a workflow
//! file for `.github/workflows/`.
//!
//! # Example
//!
//! ```ignore
//! use halfpipe_actions::ActionsRenderer;
//! use halfpipe_render::Renderer;
//!
//! let renderer = ActionsRenderer::new(config);
//! let yaml = renderer.render_to_string(&manifest)?;
//! std::fs::write(".github/workflows/web.yml", yaml)?;
//! ```

pub mod jobs;
pub mod renderer;
pub mod schema;
pub mod secrets;

pub use renderer::ActionsRenderer;
pub use schema::{Job, Step, Workflow};
