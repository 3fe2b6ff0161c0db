use crate::collaborators::FileProbe;
use crate::error::LintError;
use halfpipe_core::duration::parse_duration;
use halfpipe_core::manifest::{ARTIFACTS_PREFIX, TaskCommon};
use halfpipe_core::{Manifest, Platform};

/// Allowed retry range
pub const RETRIES: std::ops::RangeInclusive<i32> = 0..=5;

/// Rules shared by every leaf task
#[must_use]
pub fn lint_common(common: &TaskCommon) -> Vec<LintError> {
    let mut errors = Vec::new();

    if !RETRIES.contains(&common.retries) {
        errors.push(LintError::invalid("retries", "must be between 0 and 5"));
    }
    if !common.timeout.is_empty() && parse_duration(&common.timeout).is_none() {
        errors.push(LintError::invalid(
            "timeout",
            format!("'{}' is not a valid duration such as 30m or 1h", common.timeout),
        ));
    }

    errors
}

/// File check that skips paths produced by a previous task
pub(super) fn check_file(
    files: &dyn FileProbe,
    path: &str,
    executable: bool,
) -> Option<LintError> {
    if path.starts_with(ARTIFACTS_PREFIX) {
        return None;
    }
    files
        .check(path, executable)
        .err()
        .map(|issue| LintError::file(path, issue))
}

/// `tag` selects the image tag a task publishes or deploys
pub(super) fn lint_tag(tag: &str, manifest: &Manifest) -> Option<LintError> {
    match tag {
        "" | "gitref" => None,
        "version" if manifest.feature_toggles.versioned() || manifest.platform == Platform::Actions => {
            None
        }
        "version" => Some(LintError::invalid(
            "tag",
            "'version' requires the 'update-pipeline' feature toggle",
        )),
        other => Some(LintError::invalid(
            "tag",
            format!("'{other}' must be one of 'gitref' or 'version'"),
        )),
    }
}
