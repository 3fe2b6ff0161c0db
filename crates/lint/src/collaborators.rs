//! External collaborators consulted by linters
//!
//! Linters never touch the filesystem, git or deploy targets themselves.
//! Everything they need from the outside world comes through these traits,
//! so the CLI can plug in real implementations and tests can plug in the
//! in-memory ones from [`crate::memory`].

use halfpipe_core::manifest::Vars;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a file referenced by the manifest cannot be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileIssue {
    /// Nothing exists at the path
    NotFound,
    /// The path is a directory
    IsDirectory,
    /// The file has no content
    Empty,
    /// The file lacks the executable bit
    NotExecutable,
}

impl fmt::Display for FileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "does not exist",
            Self::IsDirectory => "is not a file",
            Self::Empty => "is empty",
            Self::NotExecutable => "is not executable",
        };
        f.write_str(text)
    }
}

/// Failure reported by a collaborator, surfaced to the user verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CollaboratorError {
    /// What went wrong
    pub message: String,
}

impl CollaboratorError {
    /// Error carrying `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Filesystem queries, paths relative to the manifest directory
pub trait FileProbe: Send + Sync {
    /// Check that `path` is a non-empty regular file, and executable if asked
    ///
    /// # Errors
    /// Returns the first [`FileIssue`] found
    fn check(&self, path: &str, executable: bool) -> Result<(), FileIssue>;

    /// Whether anything (file or directory) exists at `path`
    fn exists(&self, path: &str) -> bool;
}

/// Metadata about the git working copy the manifest lives in
pub trait GitMetadata: Send + Sync {
    /// Currently checked out branch
    ///
    /// # Errors
    /// Returns the underlying failure when the branch cannot be resolved
    fn current_branch(&self) -> Result<String, CollaboratorError>;

    /// URI of the `origin` remote
    ///
    /// # Errors
    /// Returns the underlying failure when the remote cannot be resolved
    fn origin_uri(&self) -> Result<String, CollaboratorError>;
}

/// An application declared in a Cloud Foundry manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Application {
    /// Application name
    pub name: String,
    /// Routes the application binds
    pub routes: Vec<String>,
    /// Whether the application is deployed without routes
    pub no_route: bool,
    /// Health check type, e.g. `process` or `http`
    pub health_check_type: String,
    /// Deprecated single buildpack
    pub buildpack: String,
    /// Docker image the application runs, if any
    pub docker_image: String,
}

/// Reads application metadata out of deploy manifests
pub trait DeployInventory: Send + Sync {
    /// Applications declared in `manifest_path` after variable substitution
    ///
    /// # Errors
    /// Returns the underlying failure when the manifest cannot be read
    fn applications(
        &self,
        manifest_path: &str,
        vars_files: &[String],
        vars: &Vars,
    ) -> Result<Vec<Application>, CollaboratorError>;
}

/// The full set of collaborators a lint run needs
#[derive(Clone)]
pub struct Collaborators {
    /// Filesystem probe
    pub files: Arc<dyn FileProbe>,
    /// Git metadata
    pub git: Arc<dyn GitMetadata>,
    /// Deploy manifest reader
    pub inventory: Arc<dyn DeployInventory>,
}

impl Collaborators {
    /// Bundle the given collaborators
    #[must_use]
    pub fn new(
        files: Arc<dyn FileProbe>,
        git: Arc<dyn GitMetadata>,
        inventory: Arc<dyn DeployInventory>,
    ) -> Self {
        Self {
            files,
            git,
            inventory,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
