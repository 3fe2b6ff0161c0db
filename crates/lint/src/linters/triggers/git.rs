use crate::collaborators::{FileIssue, FileProbe, GitMetadata};
use crate::error::LintError;
use crate::linters::{Findings, is_secret_reference};
use halfpipe_core::manifest::{DEFAULT_BRANCHES, GitTrigger};

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

/// Check a git trigger against the working copy it describes
///
/// Failures of the git collaborator are reported verbatim as errors. A
/// branch that cannot be resolved is a different finding from a branch that
/// resolves to something other than the trigger's.
#[must_use]
pub fn lint_git_trigger(
    trigger: &GitTrigger,
    files: &dyn FileProbe,
    git: &dyn GitMetadata,
) -> Findings {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    lint_uri(trigger, git, &mut errors, &mut warnings);
    errors.extend(lint_watched_paths(trigger, files));

    if !trigger.git_crypt_key.is_empty() && !is_secret_reference(&trigger.git_crypt_key) {
        errors.push(LintError::invalid(
            "git_crypt_key",
            "must be a secret reference such as '((gitcrypt.key))'",
        ));
    }

    match git.current_branch() {
        Err(err) => errors.push(LintError::collaborator(err.message)),
        Ok(current) => {
            if let Some(err) = lint_branch(&trigger.branch, &current) {
                errors.push(err);
            }
        }
    }

    (errors, warnings)
}

fn lint_uri(
    trigger: &GitTrigger,
    git: &dyn GitMetadata,
    errors: &mut Vec<LintError>,
    warnings: &mut Vec<LintError>,
) {
    let uri = trigger.uri.as_str();
    if uri.is_empty() {
        errors.push(LintError::missing("uri"));
        return;
    }

    if uri.starts_with("git@") {
        if trigger.private_key.is_empty() {
            errors.push(LintError::missing("private_key"));
        }
    } else if uri.starts_with("https://") {
        if trigger.private_key.is_empty() {
            warnings.push(LintError::invalid(
                "uri",
                "https uris only work for public repositories, use a git@ uri with a private_key for private ones",
            ));
        } else {
            errors.push(LintError::invalid(
                "uri",
                "a private_key cannot be used with an https uri",
            ));
        }
    } else {
        errors.push(LintError::invalid(
            "uri",
            format!("'{uri}' is not a valid git uri, expected git@<host>:<repo> or https://<host>/<repo>"),
        ));
        return;
    }

    match git.origin_uri() {
        Err(err) => errors.push(LintError::collaborator(err.message)),
        Ok(origin) if !same_repository(&origin, uri) => warnings.push(LintError::invalid(
            "uri",
            format!("'{uri}' does not match the origin of this working copy '{origin}'"),
        )),
        Ok(_) => {}
    }
}

fn same_repository(a: &str, b: &str) -> bool {
    fn key(uri: &str) -> String {
        let stripped = uri
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("git@")
            .trim_end_matches('/')
            .trim_end_matches(".git");
        stripped.replacen(':', "/", 1).to_lowercase()
    }
    key(a) == key(b)
}

fn lint_watched_paths(trigger: &GitTrigger, files: &dyn FileProbe) -> Vec<LintError> {
    let to_git_root = "../".repeat(depth(&trigger.base_path));

    trigger
        .watched_paths
        .iter()
        .filter_map(|watched| {
            if let Err(err) = glob::Pattern::new(watched) {
                return Some(LintError::invalid(
                    "watched_paths",
                    format!("'{watched}' is not a valid glob: {}", err.msg),
                ));
            }
            let prefix = literal_prefix(watched);
            if prefix.is_empty() || files.exists(&format!("{to_git_root}{prefix}")) {
                None
            } else {
                Some(LintError::file(watched.as_str(), FileIssue::NotFound))
            }
        })
        .collect()
}

fn depth(base_path: &str) -> usize {
    base_path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .count()
}

/// Leading path segments without glob metacharacters
fn literal_prefix(pattern: &str) -> String {
    pattern
        .split('/')
        .take_while(|segment| !segment.contains(GLOB_META))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn lint_branch(branch: &str, current: &str) -> Option<LintError> {
    if branch.is_empty() {
        if DEFAULT_BRANCHES.contains(&current) {
            None
        } else {
            Some(LintError::invalid(
                "branch",
                format!("you are on branch '{current}', set 'branch: {current}' on the git trigger"),
            ))
        }
    } else if branch == current {
        None
    } else {
        Some(LintError::invalid(
            "branch",
            format!("'{branch}' does not match the current branch '{current}'"),
        ))
    }
}
