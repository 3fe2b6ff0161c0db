use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::manifest::PipelineTrigger;

/// Build statuses an upstream job can trigger on
pub const VALID_STATUSES: [&str; 4] = ["succeeded", "failed", "errored", "aborted"];

/// Upstream pipelines must belong to the same team and name a job
#[must_use]
pub fn lint_pipeline_trigger(trigger: &PipelineTrigger, team: &str) -> Findings {
    let mut errors = Vec::new();

    for (field, value) in [
        ("concourse_url", &trigger.concourse_url),
        ("username", &trigger.username),
        ("password", &trigger.password),
    ] {
        if value.is_empty() {
            errors.push(LintError::missing(field));
        }
    }

    if trigger.team != team {
        errors.push(LintError::invalid(
            "team",
            format!("you can only trigger on pipelines of your own team '{team}'"),
        ));
    }
    if trigger.pipeline.is_empty() {
        errors.push(LintError::invalid("pipeline", "upstream pipeline must be set"));
    }
    if trigger.job.is_empty() {
        errors.push(LintError::invalid("job", "upstream job must be set"));
    }
    if !VALID_STATUSES.contains(&trigger.status.as_str()) {
        errors.push(LintError::invalid(
            "status",
            format!(
                "'{}' is not one of {}",
                trigger.status,
                VALID_STATUSES.join(", ")
            ),
        ));
    }

    (errors, Vec::new())
}
