use super::common::{check_file, lint_common};
use super::consumer_integration_test::lint_consumer_integration_test;
use super::run::lint_run;
use crate::collaborators::FileProbe;
use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::{DeployCf, LeafTask};
use halfpipe_core::Task;

/// Cloud Foundry deployments, including their pre-promote checks
#[must_use]
pub fn lint_deploy_cf(task: &DeployCf, files: &dyn FileProbe) -> Findings {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (field, value) in [
        ("api", &task.api),
        ("org", &task.org),
        ("space", &task.space),
        ("username", &task.username),
        ("password", &task.password),
    ] {
        if value.is_empty() {
            errors.push(LintError::missing(field));
        }
    }

    if task.manifest.is_empty() {
        errors.push(LintError::missing("manifest"));
    } else if let Some(err) = check_file(files, &task.manifest, false) {
        errors.push(err);
    }
    if !task.deploy_artifact.is_empty()
        && let Some(err) = check_file(files, &task.deploy_artifact, false)
    {
        errors.push(err);
    }

    if task.rolling && !task.pre_promote.is_empty() {
        errors.push(LintError::invalid(
            "pre_promote",
            "cannot be used together with a rolling deploy",
        ));
    }

    for (j, pre) in task.pre_promote.iter().enumerate() {
        let position = format!("pre_promote[{j}]");
        let (pre_errors, pre_warnings) = match pre {
            Task::Leaf(leaf @ LeafTask::Run(run)) => {
                let (mut e, w) = lint_run(run, files);
                e.extend(lint_common(leaf.common()));
                (e, w)
            }
            Task::Leaf(leaf @ LeafTask::ConsumerIntegrationTest(cit)) => {
                let (mut e, w) = lint_consumer_integration_test(cit, true);
                e.extend(lint_common(leaf.common()));
                (e, w)
            }
            other => (
                vec![LintError::invalid(
                    "type",
                    format!(
                        "pre_promote may only contain run and consumer-integration-test tasks, found '{}'",
                        other.kind()
                    ),
                )],
                Vec::new(),
            ),
        };
        errors.extend(pre_errors.into_iter().map(|e| e.at(&position)));
        warnings.extend(pre_warnings.into_iter().map(|e| e.at(&position)));
    }

    (errors, warnings)
}
