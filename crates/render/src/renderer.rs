//! Renderer trait
//!
//! A renderer lowers a manifest that already passed linting and defaulting
//! into the typed graph of one CI backend. The graph is a plain serde value;
//! [`Renderer::render_to_string`] turns it into the backend's YAML document.

use crate::error::{RenderError, RenderResult};
use halfpipe_core::{CompilerConfig, Manifest, Task, TaskList};
use serde::Serialize;

/// Trait for CI backend renderers
///
/// # Example
///
/// ```ignore
/// use halfpipe_render::{Renderer, RenderResult};
///
/// struct Listing(CompilerConfig);
///
/// impl Renderer for Listing {
///     type Graph = Vec<String>;
///
///     fn render(&self, manifest: &Manifest) -> RenderResult<Self::Graph> {
///         Ok(manifest.tasks.flatten().iter().map(|t| t.name()).collect())
///     }
///
///     fn config(&self) -> &CompilerConfig {
///         &self.0
///     }
///
///     fn format_name(&self) -> &'static str {
///         "listing"
///     }
/// }
/// ```
pub trait Renderer: Send + Sync {
    /// Backend graph
    type Graph: Serialize;

    /// Lower the manifest into the backend graph
    ///
    /// # Errors
    /// Returns [`crate::RenderError::InvalidIr`] when the manifest breaks an
    /// invariant the linters should have enforced
    fn render(&self, manifest: &Manifest) -> RenderResult<Self::Graph>;

    /// Configuration the renderer was built with
    fn config(&self) -> &CompilerConfig;

    /// Backend identifier, used for `--platform`
    fn format_name(&self) -> &'static str;

    /// Extension of the rendered file
    fn file_extension(&self) -> &'static str {
        "yml"
    }

    /// Human-readable description
    fn description(&self) -> &'static str {
        "CI pipeline renderer"
    }

    /// Check the manifest before rendering
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidIr`] if the task tree has a shape the
    /// linters reject
    fn validate(&self, manifest: &Manifest) -> RenderResult<()> {
        check_task_tree(&manifest.tasks)
    }

    /// Render and serialize, prefixed with the version header
    ///
    /// # Errors
    /// Returns an error if validation, rendering or serialization fails
    fn render_to_string(&self, manifest: &Manifest) -> RenderResult<String> {
        self.validate(manifest)?;
        let graph = self.render(manifest)?;
        serialize(&graph, &self.config().version)
    }
}

/// Check the nesting rules of a task tree: sequences only directly inside
/// a parallel, parallels only at the top level, sequences hold only leaves.
///
/// # Errors
/// Returns [`RenderError::InvalidIr`] naming the first offending position
pub fn check_task_tree(tasks: &TaskList) -> RenderResult<()> {
    for (i, task) in tasks.iter().enumerate() {
        match task {
            Task::Leaf(_) => {}
            Task::Sequence(_) => {
                return Err(RenderError::invalid_ir(format!(
                    "tasks[{i}]: sequence outside of a parallel"
                )));
            }
            Task::Parallel(parallel) => {
                for (j, child) in parallel.tasks.iter().enumerate() {
                    match child {
                        Task::Leaf(_) => {}
                        Task::Parallel(_) => {
                            return Err(RenderError::invalid_ir(format!(
                                "tasks[{i}].tasks[{j}]: parallel inside a parallel"
                            )));
                        }
                        Task::Sequence(sequence) => {
                            if let Some(k) = sequence.tasks.iter().position(|t| t.as_leaf().is_none()) {
                                return Err(RenderError::invalid_ir(format!(
                                    "tasks[{i}].tasks[{j}].tasks[{k}]: composite inside a sequence"
                                )));
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Leading comment of every rendered document
#[must_use]
pub fn header(version: &str) -> String {
    format!("# Generated using halfpipe version {version}")
}

/// Serialize a graph to YAML with the version header
///
/// # Errors
/// Returns [`crate::RenderError::Serialization`] if the graph cannot be
/// written as YAML
pub fn serialize<G: Serialize>(graph: &G, version: &str) -> RenderResult<String> {
    let yaml = serde_yaml::to_string(graph)?;
    Ok(format!("{}\n{yaml}", header(version)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Listing(CompilerConfig);

    impl Renderer for Listing {
        type Graph = Vec<String>;

        fn render(&self, manifest: &Manifest) -> RenderResult<Self::Graph> {
            Ok(manifest.tasks.flatten().iter().map(|t| t.name()).collect())
        }

        fn config(&self) -> &CompilerConfig {
            &self.0
        }

        fn format_name(&self) -> &'static str {
            "listing"
        }
    }

    #[test]
    fn test_task_tree_shapes() {
        use halfpipe_core::manifest::{Parallel, Run, Sequence};

        let leaf = || Task::from(Run::default());
        let sequence = |tasks: Vec<Task>| Task::Sequence(Sequence { tasks: tasks.into() });
        let parallel = |tasks: Vec<Task>| Task::Parallel(Parallel { tasks: tasks.into() });

        let valid = TaskList::from(vec![leaf(), parallel(vec![leaf(), sequence(vec![leaf(), leaf()])])]);
        assert!(check_task_tree(&valid).is_ok());

        let top_sequence = TaskList::from(vec![sequence(vec![leaf()])]);
        assert!(matches!(check_task_tree(&top_sequence), Err(RenderError::InvalidIr(_))));

        let nested = TaskList::from(vec![parallel(vec![parallel(vec![leaf()])])]);
        let err = check_task_tree(&nested).unwrap_err();
        assert!(err.to_string().contains("tasks[0].tasks[0]"));

        let deep = TaskList::from(vec![parallel(vec![sequence(vec![leaf(), parallel(vec![])])])]);
        assert!(check_task_tree(&deep).is_err());
    }

    #[test]
    fn test_header_names_version() {
        assert_eq!(header("3.1.0"), "# Generated using halfpipe version 3.1.0");
    }

    #[test]
    fn test_render_to_string() {
        let renderer = Listing(CompilerConfig::default().with_version("1.2.3"));
        let manifest = Manifest::default();

        let output = renderer.render_to_string(&manifest).unwrap();
        assert!(output.starts_with("# Generated using halfpipe version 1.2.3\n"));
        assert_eq!(renderer.file_extension(), "yml");
        assert_eq!(renderer.format_name(), "listing");
    }
}
