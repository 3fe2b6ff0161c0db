//! Paths inside a Concourse task container
//!
//! Every input is mounted side by side in the build's working directory,
//! so a script running in `git/<base path>` reaches other inputs and
//! outputs by walking back up to that root.

pub use halfpipe_render::convert::join_path as join;

fn depth(dir: &str) -> usize {
    join([dir]).split('/').filter(|p| !p.is_empty()).count()
}

fn up(levels: usize) -> String {
    vec![".."; levels].join("/")
}

/// Path of the git ref file relative to `git/<base path>`
#[must_use]
pub fn git_ref(base_path: &str) -> String {
    join([up(depth(base_path)), ".git/ref".to_string()])
}

/// Path of the version file relative to `git/<base path>`
#[must_use]
pub fn version_file(base_path: &str) -> String {
    join([up(depth(base_path)), "../version/version".to_string()])
}

/// Directory under `output` that `artifact` is copied into, relative to
/// `<git>/<base path>`.
///
/// The artifact keeps its position relative to the base path, so
/// `target/app.jar` lands in `<output>/<base path>/target`.
#[must_use]
pub fn artifact_destination(git: &str, base_path: &str, output: &str, artifact: &str) -> String {
    let root = up(depth(&join([git, base_path])));
    let artifact = artifact.trim_end_matches('/');
    let parent = match artifact.rfind('/') {
        Some(i) => &artifact[..i],
        None => "",
    };
    join([root.as_str(), output, base_path, parent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join(["git", ""]), "git");
        assert_eq!(join(["git", "a/b", "./c"]), "git/a/b/c");
        assert_eq!(join(["../", "../", "artifacts"]), "../../artifacts");
        assert_eq!(join(["a/b", "..", "c"]), "a/c");
    }

    #[test]
    fn test_git_ref_and_version_paths() {
        assert_eq!(git_ref(""), ".git/ref");
        assert_eq!(git_ref("apps/web"), "../../.git/ref");
        assert_eq!(version_file(""), "../version/version");
        assert_eq!(version_file("apps/web"), "../../../version/version");
    }

    #[test]
    fn test_artifact_destination() {
        assert_eq!(artifact_destination("git", "", "artifacts-out", "target"), "../artifacts-out");
        assert_eq!(
            artifact_destination("git", "", "artifacts-out", "target/app.jar"),
            "../artifacts-out/target"
        );
        assert_eq!(
            artifact_destination("git", "apps/web", "artifacts-out-failure", "reports/"),
            "../../../artifacts-out-failure/apps/web"
        );
    }
}
