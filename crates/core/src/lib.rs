//! Core types for the halfpipe pipeline compiler.
//!
//! This crate holds everything the other stages share:
//!
//! - [`manifest`]: the task/trigger intermediate representation a manifest is
//!   parsed into, plus the read-only structural queries the linters and
//!   renderers rely on.
//! - [`config`]: the explicit [`CompilerConfig`] threaded through a compilation
//!   in place of process-wide constants.
//! - [`defaults`]: the defaulting pass that fills unset per-task settings from
//!   pipeline-level defaults without touching its input.
//! - [`duration`]: timeout parsing shared by linting and rendering.

pub mod config;
pub mod defaults;
pub mod duration;
pub mod manifest;

pub use config::{CompilerConfig, ConfigError};
pub use defaults::{Defaulter, Mapper, NotificationsMapper, UpdatePipelineMapper};
pub use manifest::{
    ArtifactConfig, FeatureToggles, LeafTask, Manifest, Notifications, Platform, Task,
    TaskList, TaskPath, Trigger, TriggerList,
};
