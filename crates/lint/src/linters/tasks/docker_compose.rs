use super::common::check_file;
use crate::collaborators::FileProbe;
use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::DockerCompose;

/// The compose file must exist and name a service
#[must_use]
pub fn lint_docker_compose(compose: &DockerCompose, files: &dyn FileProbe) -> Findings {
    let mut errors = Vec::new();

    if compose.compose_file.is_empty() {
        errors.push(LintError::missing("compose_file"));
    } else if let Some(err) = check_file(files, &compose.compose_file, false) {
        errors.push(err);
    }
    if compose.service.is_empty() {
        errors.push(LintError::missing("service"));
    }

    (errors, Vec::new())
}
