use super::common::{check_file, lint_tag};
use crate::collaborators::FileProbe;
use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::Manifest;
use halfpipe_core::manifest::DeployKatee;

/// Katee deployments need an application and a vela file
#[must_use]
pub fn lint_deploy_katee(task: &DeployKatee, manifest: &Manifest, files: &dyn FileProbe) -> Findings {
    let mut errors = Vec::new();

    if task.application_name.is_empty() {
        errors.push(LintError::missing("application_name"));
    }
    if task.vela_manifest.is_empty() {
        errors.push(LintError::missing("vela_manifest"));
    } else if let Some(err) = check_file(files, &task.vela_manifest, false) {
        errors.push(err);
    }
    errors.extend(lint_tag(&task.tag, manifest));

    (errors, Vec::new())
}
