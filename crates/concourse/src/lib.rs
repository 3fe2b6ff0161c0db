//! Concourse backend for halfpipe
//!
//! Renders a linted, defaulted [`halfpipe_core::Manifest`] into a Concourse
//! pipeline configuration.
//!
//! # Example
//!
//! ```ignore
//! use halfpipe_concourse::ConcourseRenderer;
//! use halfpipe_render::Renderer;
//!
//! let renderer = ConcourseRenderer::new(config);
//! let yaml = renderer.render_to_string(&manifest)?;
//! std::fs::write("pipeline.yml", yaml)?;
//! ```

pub mod docker_push;
pub mod jobs;
pub mod paths;
pub mod renderer;
pub mod resources;
pub mod schema;

pub use renderer::ConcourseRenderer;
pub use schema::{Job, Pipeline, Resource, ResourceType, Step};
