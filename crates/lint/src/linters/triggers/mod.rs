//! Trigger linters

mod docker;
mod git;
mod pipeline;
mod timer;

pub use docker::lint_docker_trigger;
pub use git::lint_git_trigger;
pub use pipeline::{VALID_STATUSES, lint_pipeline_trigger};
pub use timer::lint_timer_trigger;

use super::docs_url;
use crate::collaborators::{Collaborators, FileProbe, GitMetadata};
use crate::error::LintError;
use crate::linter::Linter;
use crate::result::LintResult;
use halfpipe_core::{CompilerConfig, Manifest, Trigger};
use std::sync::Arc;

/// Checks every trigger, and that there is exactly one git trigger
pub struct TriggersLinter {
    docs_url: String,
    files: Arc<dyn FileProbe>,
    git: Arc<dyn GitMetadata>,
}

impl TriggersLinter {
    /// Linter consulting the given collaborators
    #[must_use]
    pub fn new(config: &CompilerConfig, collaborators: &Collaborators) -> Self {
        Self {
            docs_url: docs_url(config, "manifest/#triggers"),
            files: Arc::clone(&collaborators.files),
            git: Arc::clone(&collaborators.git),
        }
    }
}

impl Linter for TriggersLinter {
    fn name(&self) -> &'static str {
        "Triggers"
    }

    fn lint(&self, manifest: &Manifest) -> LintResult {
        let mut result = LintResult::new(self.name(), &self.docs_url);

        for (kind, allowed) in [("git", 1..=1), ("timer", 0..=1), ("docker", 0..=1)] {
            let count = manifest.triggers.iter().filter(|t| t.kind() == kind).count();
            if !allowed.contains(&count) {
                result.add_error(LintError::invalid(
                    "triggers",
                    format!(
                        "found {count} {kind} triggers, expected {}",
                        if *allowed.start() == 1 { "exactly one" } else { "at most one" }
                    ),
                ));
            }
        }

        for (i, trigger) in manifest.triggers.iter().enumerate() {
            let (errors, warnings) = match trigger {
                Trigger::Git(git) => lint_git_trigger(git, self.files.as_ref(), self.git.as_ref()),
                Trigger::Timer(timer) => lint_timer_trigger(timer),
                Trigger::Docker(docker) => lint_docker_trigger(docker),
                Trigger::Pipeline(upstream) => lint_pipeline_trigger(upstream, &manifest.team),
            };
            let position = format!("triggers[{i}]");
            result.add_errors(errors.into_iter().map(|e| e.at(&position)));
            result.add_warnings(warnings.into_iter().map(|e| e.at(&position)));
        }

        result
    }
}

impl std::fmt::Debug for TriggersLinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggersLinter")
            .field("docs_url", &self.docs_url)
            .finish_non_exhaustive()
    }
}
