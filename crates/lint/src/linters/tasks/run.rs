use super::common::check_file;
use crate::collaborators::FileProbe;
use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::{Docker, Run};

/// A run task needs a script that exists and is executable, unless it is
/// prefixed with `\` to mark a command that lives inside the image
#[must_use]
pub fn lint_run(run: &Run, files: &dyn FileProbe) -> Findings {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let script = run.script.trim();
    match script.split_whitespace().next() {
        None => errors.push(LintError::missing("script")),
        Some(command) => {
            if let Some(in_image) = command.strip_prefix('\\') {
                warnings.push(LintError::invalid(
                    "script",
                    format!("make sure '{in_image}' is available in the docker image you have specified"),
                ));
            } else if let Some(err) = check_file(files, command, true) {
                errors.push(err);
            }
        }
    }

    errors.extend(lint_docker(&run.docker));
    (errors, warnings)
}

/// Image and credential pairing of a run task
fn lint_docker(docker: &Docker) -> Vec<LintError> {
    let mut errors = Vec::new();
    if docker.image.is_empty() {
        errors.push(LintError::missing("docker.image"));
    }
    if !docker.username.is_empty() && docker.password.is_empty() {
        errors.push(LintError::missing("docker.password"));
    }
    if !docker.password.is_empty() && docker.username.is_empty() {
        errors.push(LintError::missing("docker.username"));
    }
    errors
}
