use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::DockerTrigger;

/// A docker trigger needs an image; credentials come in pairs
#[must_use]
pub fn lint_docker_trigger(trigger: &DockerTrigger) -> Findings {
    let mut errors = Vec::new();

    if trigger.image.is_empty() {
        errors.push(LintError::missing("image"));
    }
    if !trigger.username.is_empty() && trigger.password.is_empty() {
        errors.push(LintError::missing("password"));
    }
    if !trigger.password.is_empty() && trigger.username.is_empty() {
        errors.push(LintError::missing("username"));
    }

    (errors, Vec::new())
}
