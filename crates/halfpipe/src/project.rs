//! Locating and loading the halfpipe manifest
//!
//! A manifest is one of [`MANIFEST_FILES`] in the working directory. The
//! directory it lives in must be inside a git working copy; its path
//! relative to the git root becomes the git trigger's base path.

use halfpipe_core::Manifest;
use halfpipe_lint::GitMetadata;
use miette::Diagnostic;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// File names a manifest may have
pub const MANIFEST_FILES: [&str; 3] = [".halfpipe.io", ".halfpipe.io.yml", ".halfpipe.io.yaml"];

/// Errors finding or reading the manifest
#[derive(Debug, Error, Diagnostic)]
pub enum ProjectError {
    /// No manifest file in the directory
    #[error("couldn't find any of the allowed {names} files in {dir}")]
    #[diagnostic(
        code(halfpipe::project::no_manifest),
        help("Create a .halfpipe.io file, or point at one with --manifest")
    )]
    NoManifest {
        /// Allowed names, comma separated
        names: String,
        /// Directory searched
        dir: String,
    },

    /// More than one manifest file in the directory
    #[error("found {found} files, please remove all but one")]
    #[diagnostic(code(halfpipe::project::multiple_manifests))]
    MultipleManifests {
        /// Files found, comma separated
        found: String,
    },

    /// The manifest is not inside a git working copy
    #[error("looks like you are not executing halfpipe from within a git repo: {dir}")]
    #[diagnostic(code(halfpipe::project::not_in_repo))]
    NotInRepo {
        /// Directory of the manifest
        dir: String,
    },

    /// The manifest could not be read
    #[error("failed to read {path}")]
    #[diagnostic(code(halfpipe::project::read))]
    Read {
        /// Path of the manifest
        path: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The manifest has no content
    #[error("{path} is empty")]
    #[diagnostic(code(halfpipe::project::empty))]
    Empty {
        /// Path of the manifest
        path: String,
    },

    /// The manifest is not valid YAML for a halfpipe manifest
    #[error("failed to parse {path}: {message}")]
    #[diagnostic(
        code(halfpipe::project::parse),
        help("See https://docs.halfpipe.io/manifest/ for the manifest format")
    )]
    Parse {
        /// Path of the manifest
        path: String,
        /// Parser message, including the location
        message: String,
    },
}

/// Manifest file in `dir`
///
/// # Errors
/// Fails when none or more than one of [`MANIFEST_FILES`] exists
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ProjectError> {
    let found: Vec<PathBuf> = MANIFEST_FILES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect();

    match found.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(ProjectError::NoManifest {
            names: MANIFEST_FILES.join(", "),
            dir: dir.display().to_string(),
        }),
        many => Err(ProjectError::MultipleManifests {
            found: many
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Parse a manifest document
///
/// # Errors
/// Fails on blank input or YAML that does not describe a manifest
pub fn parse_manifest(source: &str, path: &str) -> Result<Manifest, ProjectError> {
    if source.trim().is_empty() {
        return Err(ProjectError::Empty {
            path: path.to_string(),
        });
    }
    serde_yaml::from_str(source).map_err(|err| ProjectError::Parse {
        path: path.to_string(),
        message: err.to_string(),
    })
}

/// Read and parse the manifest at `path`
///
/// # Errors
/// Fails when the file cannot be read or parsed
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_manifest(path: &Path) -> Result<Manifest, ProjectError> {
    let display = path.display().to_string();
    let source = fs::read_to_string(path).map_err(|source| ProjectError::Read {
        path: display.clone(),
        source,
    })?;
    let manifest = parse_manifest(&source, &display)?;
    debug!(
        team = %manifest.team,
        pipeline = %manifest.pipeline,
        tasks = manifest.tasks.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

/// Where the manifest sits within its git working copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectData {
    /// Manifest directory relative to the git root, `/`-separated
    pub base_path: String,
    /// Name of the git root directory
    pub root_name: String,
    /// URI of the `origin` remote, when it could be resolved
    pub git_uri: Option<String>,
}

impl ProjectData {
    /// Store the project data into the manifest's git trigger
    ///
    /// The trigger's URI is only filled when the author left it blank.
    pub fn apply(&self, manifest: &mut Manifest) {
        if let Some(git) = manifest.triggers.git_trigger_mut() {
            git.base_path.clone_from(&self.base_path);
            if let (true, Some(uri)) = (git.uri.is_empty(), &self.git_uri) {
                git.uri.clone_from(uri);
            }
        }
    }
}

/// Walk up from `dir` to the directory holding `.git`
///
/// # Errors
/// Fails when no ancestor of `dir` is a git working copy
pub fn discover(dir: &Path, git: &dyn GitMetadata) -> Result<ProjectData, ProjectError> {
    let dir = absolute(dir);
    let root = dir
        .ancestors()
        .find(|candidate| candidate.join(".git").exists())
        .ok_or_else(|| ProjectError::NotInRepo {
            dir: dir.display().to_string(),
        })?;

    let base_path = dir
        .strip_prefix(root)
        .map(|relative| {
            relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    let data = ProjectData {
        base_path,
        root_name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        git_uri: git.origin_uri().ok(),
    };
    debug!(base_path = %data.base_path, root = %data.root_name, "project discovered");
    Ok(data)
}

fn absolute(dir: &Path) -> PathBuf {
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfpipe_core::manifest::GitTrigger;
    use halfpipe_core::{Trigger, TriggerList};
    use halfpipe_lint::memory::StaticGit;
    use tempfile::TempDir;

    #[test]
    fn test_find_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            find_manifest(dir.path()),
            Err(ProjectError::NoManifest { .. })
        ));

        fs::write(dir.path().join(".halfpipe.io.yml"), "team: ee").unwrap();
        assert_eq!(
            find_manifest(dir.path()).unwrap(),
            dir.path().join(".halfpipe.io.yml")
        );

        fs::write(dir.path().join(".halfpipe.io"), "team: ee").unwrap();
        let err = find_manifest(dir.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "found .halfpipe.io, .halfpipe.io.yml files, please remove all but one"
        );
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = parse_manifest("team: ee\npipeline: web\n", ".halfpipe.io").unwrap();
        assert_eq!(manifest.team, "ee");
        assert_eq!(manifest.pipeline, "web");

        assert!(matches!(
            parse_manifest("  \n", ".halfpipe.io"),
            Err(ProjectError::Empty { .. })
        ));
        assert!(matches!(
            parse_manifest("team: [", ".halfpipe.io"),
            Err(ProjectError::Parse { .. })
        ));
    }

    #[test]
    fn test_discover_base_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let app = dir.path().join("apps").join("web");
        fs::create_dir_all(&app).unwrap();

        let git = StaticGit::new("main", "git@github.com:ee/repo.git");
        let data = discover(&app, &git).unwrap();
        assert_eq!(data.base_path, "apps/web");
        assert_eq!(data.git_uri.as_deref(), Some("git@github.com:ee/repo.git"));

        let at_root = discover(dir.path(), &git).unwrap();
        assert_eq!(at_root.base_path, "");
    }

    #[test]
    fn test_discover_outside_repository() {
        let dir = TempDir::new().unwrap();
        let git = StaticGit::new("main", "git@github.com:ee/repo.git");
        // TempDir may itself live below a working copy on a developer machine.
        if dir.path().ancestors().any(|p| p.join(".git").exists()) {
            return;
        }
        assert!(matches!(
            discover(dir.path(), &git),
            Err(ProjectError::NotInRepo { .. })
        ));
    }

    #[test]
    fn test_apply_keeps_explicit_uri() {
        let data = ProjectData {
            base_path: "apps/web".to_string(),
            root_name: "repo".to_string(),
            git_uri: Some("git@github.com:ee/repo.git".to_string()),
        };

        let mut blank = Manifest {
            triggers: TriggerList::from(vec![Trigger::Git(GitTrigger::default())]),
            ..Manifest::default()
        };
        data.apply(&mut blank);
        let git = blank.triggers.git_trigger().unwrap();
        assert_eq!(git.base_path, "apps/web");
        assert_eq!(git.uri, "git@github.com:ee/repo.git");

        let mut explicit = Manifest {
            triggers: TriggerList::from(vec![Trigger::Git(GitTrigger {
                uri: "https://github.com/ee/other".to_string(),
                ..GitTrigger::default()
            })]),
            ..Manifest::default()
        };
        data.apply(&mut explicit);
        assert_eq!(
            explicit.triggers.git_trigger().unwrap().uri,
            "https://github.com/ee/other"
        );
    }
}
