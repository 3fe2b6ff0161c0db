use super::common::{check_file, lint_tag};
use crate::collaborators::{FileIssue, FileProbe};
use crate::error::LintError;
use crate::linters::Findings;
use halfpipe_core::Manifest;
use halfpipe_core::manifest::{ARTIFACTS_PREFIX, DockerPush};

/// Image reference without its tag
#[must_use]
pub fn untagged(image: &str) -> &str {
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].find(':') {
        Some(colon) => &image[..name_start + colon],
        None => image,
    }
}

/// Rules for building and pushing an image
#[must_use]
pub fn lint_docker_push(push: &DockerPush, manifest: &Manifest, files: &dyn FileProbe) -> Findings {
    let mut errors = Vec::new();

    if push.image.is_empty() {
        errors.push(LintError::missing("image"));
    } else if untagged(&push.image) != push.image {
        errors.push(LintError::invalid(
            "image",
            "image must not carry a tag, use the 'tag' field instead",
        ));
    }

    if push.username.is_empty() {
        errors.push(LintError::missing("username"));
    }
    if push.password.is_empty() {
        errors.push(LintError::missing("password"));
    }

    if !push.build_path.is_empty()
        && !push.build_path.starts_with(ARTIFACTS_PREFIX)
        && !files.exists(&push.build_path)
    {
        errors.push(LintError::file(push.build_path.as_str(), FileIssue::NotFound));
    }
    if push.dockerfile_path.is_empty() {
        errors.push(LintError::missing("dockerfile_path"));
    } else if let Some(err) = check_file(files, &push.dockerfile_path, false) {
        errors.push(err);
    }

    errors.extend(lint_tag(&push.tag, manifest));

    if push.platforms.is_empty() {
        errors.push(LintError::invalid("platforms", "at least one platform is required"));
    }

    (errors, Vec::new())
}
