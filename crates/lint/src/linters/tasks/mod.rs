//! Task linters
//!
//! [`TasksLinter`] walks the task tree, checks the composite structure with
//! [`lint_parallel`] and [`lint_sequence`], and every leaf with the rule set
//! for its kind. Findings are located by their position in the tree.

mod common;
mod consumer_integration_test;
mod deploy_cf;
mod deploy_katee;
mod deploy_ml;
mod docker_compose;
mod docker_push;
mod run;

pub use common::{RETRIES, lint_common};
pub use consumer_integration_test::lint_consumer_integration_test;
pub use deploy_cf::lint_deploy_cf;
pub use deploy_katee::lint_deploy_katee;
pub use deploy_ml::{lint_deploy_ml_modules, lint_deploy_ml_zip};
pub use docker_compose::lint_docker_compose;
pub use docker_push::{lint_docker_push, untagged};
pub use run::lint_run;

use super::{Findings, docs_url, task_position};
use crate::collaborators::{Collaborators, FileProbe};
use crate::error::LintError;
use crate::linter::Linter;
use crate::result::LintResult;
use halfpipe_core::manifest::{Parallel, Sequence};
use halfpipe_core::{CompilerConfig, LeafTask, Manifest, Task};
use std::sync::Arc;

/// Structural and per-kind task rules
pub struct TasksLinter {
    docs_url: String,
    files: Arc<dyn FileProbe>,
}

impl TasksLinter {
    /// Linter probing files through the given collaborators
    #[must_use]
    pub fn new(config: &CompilerConfig, collaborators: &Collaborators) -> Self {
        Self {
            docs_url: docs_url(config, "manifest/#tasks"),
            files: Arc::clone(&collaborators.files),
        }
    }

    fn lint_task(&self, task: &Task, path: &[usize], in_parallel: bool, manifest: &Manifest, result: &mut LintResult) {
        let position = task_position(path);
        let child_path = |j: usize| {
            let mut child = path.to_vec();
            child.push(j);
            child
        };

        match task {
            Task::Leaf(leaf) => {
                add_at(result, lint_leaf(leaf, manifest, self.files.as_ref()), &position);
            }
            Task::Parallel(parallel) => {
                add_at(result, lint_parallel(parallel), &position);
                for (j, child) in parallel.tasks.iter().enumerate() {
                    if !matches!(child, Task::Parallel(_)) {
                        self.lint_task(child, &child_path(j), true, manifest, result);
                    }
                }
            }
            Task::Sequence(sequence) => {
                add_at(result, lint_sequence(sequence, in_parallel), &position);
                for (j, child) in sequence.tasks.iter().enumerate() {
                    if let Task::Leaf(leaf) = child {
                        add_at(
                            result,
                            lint_leaf(leaf, manifest, self.files.as_ref()),
                            &task_position(&child_path(j)),
                        );
                    }
                }
            }
        }
    }
}

fn add_at(result: &mut LintResult, (errors, warnings): Findings, position: &str) {
    result.add_errors(errors.into_iter().map(|e| e.at(position)));
    result.add_warnings(warnings.into_iter().map(|e| e.at(position)));
}

impl Linter for TasksLinter {
    fn name(&self) -> &'static str {
        "Tasks"
    }

    fn lint(&self, manifest: &Manifest) -> LintResult {
        let mut result = LintResult::new(self.name(), &self.docs_url);

        if manifest.tasks.is_empty() {
            result.add_error(LintError::missing("tasks"));
            return result;
        }

        for (i, task) in manifest.tasks.iter().enumerate() {
            self.lint_task(task, &[i], false, manifest, &mut result);
        }

        let mut saved = false;
        for (path, leaf) in manifest.tasks.leaves() {
            let position = task_position(&path);
            if leaf.reads_from_artifacts() && !saved {
                result.add_error(
                    LintError::invalid(
                        "restore_artifacts",
                        "no previous task saves artifacts",
                    )
                    .at(&position),
                );
            }
            saved |= leaf.saves_artifacts();

            if matches!(leaf, LeafTask::Update(_)) && path.as_slice() != [0] {
                result.add_error(
                    LintError::invalid("type", "the update task must be the first task")
                        .at(&position),
                );
            }

            if let LeafTask::DockerPush(push) = leaf {
                let pushed = untagged(&push.image);
                if manifest
                    .triggers
                    .docker_triggers()
                    .any(|trigger| untagged(&trigger.image) == pushed)
                {
                    result.add_warning(
                        LintError::invalid(
                            "image",
                            format!("pushing '{pushed}' triggers this pipeline again, which loops"),
                        )
                        .at(&position),
                    );
                }
            }
        }

        result
    }
}

impl std::fmt::Debug for TasksLinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TasksLinter")
            .field("docs_url", &self.docs_url)
            .finish_non_exhaustive()
    }
}

/// Rules for one leaf: the shared attributes plus its kind's rules
#[must_use]
pub fn lint_leaf(leaf: &LeafTask, manifest: &Manifest, files: &dyn FileProbe) -> Findings {
    let (mut errors, warnings) = match leaf {
        LeafTask::Run(run) => lint_run(run, files),
        LeafTask::DockerPush(push) => lint_docker_push(push, manifest, files),
        LeafTask::DockerCompose(compose) => lint_docker_compose(compose, files),
        LeafTask::DeployCf(cf) => lint_deploy_cf(cf, files),
        LeafTask::DeployMlZip(zip) => lint_deploy_ml_zip(zip),
        LeafTask::DeployMlModules(modules) => lint_deploy_ml_modules(modules),
        LeafTask::ConsumerIntegrationTest(cit) => lint_consumer_integration_test(cit, false),
        LeafTask::DeployKatee(katee) => lint_deploy_katee(katee, manifest, files),
        LeafTask::Update(_) => {
            let mut errors = Vec::new();
            if !manifest.feature_toggles.update_pipeline() {
                errors.push(LintError::invalid(
                    "type",
                    "the update task requires the 'update-pipeline' feature toggle",
                ));
            }
            (errors, Vec::new())
        }
    };
    errors.extend(lint_common(leaf.common()));
    (errors, warnings)
}

/// Structural rules of a parallel block
///
/// Children are not linted here beyond their shape; a direct parallel child
/// is reported at its own position.
#[must_use]
pub fn lint_parallel(parallel: &Parallel) -> Findings {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match parallel.tasks.len() {
        0 => errors.push(LintError::missing("tasks")),
        1 => warnings.push(LintError::invalid(
            "tasks",
            "a parallel with a single task runs it just like a plain task",
        )),
        _ => {}
    }

    for (j, child) in parallel.tasks.iter().enumerate() {
        if matches!(child, Task::Parallel(_)) {
            errors.push(
                LintError::invalid("type", "a parallel cannot contain another parallel")
                    .at(format!("tasks[{j}]")),
            );
        }
    }

    if parallel.tasks.iter().filter(|t| t.saves_artifacts()).count() > 1 {
        warnings.push(LintError::invalid(
            "save_artifacts",
            "more than one task in the parallel saves artifacts, they will overwrite each other",
        ));
    }
    if parallel
        .tasks
        .iter()
        .filter(|t| t.saves_artifacts_on_failure())
        .count()
        > 1
    {
        warnings.push(LintError::invalid(
            "save_artifacts_on_failure",
            "more than one task in the parallel saves artifacts on failure, they will overwrite each other",
        ));
    }

    (errors, warnings)
}

/// Structural rules of a sequence
#[must_use]
pub fn lint_sequence(sequence: &Sequence, in_parallel: bool) -> Findings {
    let mut errors = Vec::new();

    if !in_parallel {
        errors.push(LintError::invalid(
            "type",
            "a sequence can only be used directly inside a parallel",
        ));
    }
    if sequence.tasks.is_empty() {
        errors.push(LintError::missing("tasks"));
    }
    for (j, child) in sequence.tasks.iter().enumerate() {
        if !matches!(child, Task::Leaf(_)) {
            errors.push(
                LintError::invalid(
                    "tasks",
                    format!("a sequence can only contain plain tasks, found '{}'", child.kind()),
                )
                .at(format!("tasks[{j}]")),
            );
        }
    }

    (errors, Vec::new())
}
