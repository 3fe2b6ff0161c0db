//! In-memory collaborators
//!
//! Useful for tests and for embedding the linters where the manifest does
//! not come from a real working copy.

use crate::collaborators::{
    Application, CollaboratorError, Collaborators, DeployInventory, FileIssue, FileProbe,
    GitMetadata,
};
use halfpipe_core::manifest::Vars;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    File { contents: String, executable: bool },
    Directory,
}

/// A filesystem held in a map
///
/// Paths are normalised before lookup, so `./a/../b` and `b` are the same
/// entry. Leading `..` segments are kept, which lets a test place files
/// above the manifest directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    entries: BTreeMap<String, Entry>,
}

impl MemoryFiles {
    /// Empty filesystem
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a regular file
    #[must_use]
    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.entries.insert(
            normalize(path),
            Entry::File {
                contents: contents.to_string(),
                executable: false,
            },
        );
        self
    }

    /// Add an executable file
    #[must_use]
    pub fn with_executable(mut self, path: &str, contents: &str) -> Self {
        self.entries.insert(
            normalize(path),
            Entry::File {
                contents: contents.to_string(),
                executable: true,
            },
        );
        self
    }

    /// Add a directory
    #[must_use]
    pub fn with_dir(mut self, path: &str) -> Self {
        self.entries.insert(normalize(path), Entry::Directory);
        self
    }
}

impl FileProbe for MemoryFiles {
    fn check(&self, path: &str, executable: bool) -> Result<(), FileIssue> {
        let path = normalize(path);
        match self.entries.get(&path) {
            None if self.exists(&path) => Err(FileIssue::IsDirectory),
            None => Err(FileIssue::NotFound),
            Some(Entry::Directory) => Err(FileIssue::IsDirectory),
            Some(Entry::File { contents, .. }) if contents.is_empty() => Err(FileIssue::Empty),
            Some(Entry::File {
                executable: false, ..
            }) if executable => Err(FileIssue::NotExecutable),
            Some(Entry::File { .. }) => Ok(()),
        }
    }

    fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        let prefix = format!("{path}/");
        self.entries
            .keys()
            .any(|p| *p == path || p.starts_with(&prefix))
    }
}

fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." if parts.last().is_some_and(|p| *p != "..") => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Fixed answers for git metadata
#[derive(Debug, Clone)]
pub struct StaticGit {
    branch: Result<String, CollaboratorError>,
    origin: Result<String, CollaboratorError>,
}

impl StaticGit {
    /// Working copy on `branch` with `origin` as remote
    #[must_use]
    pub fn new(branch: &str, origin: &str) -> Self {
        Self {
            branch: Ok(branch.to_string()),
            origin: Ok(origin.to_string()),
        }
    }

    /// Fail branch resolution with `message`
    #[must_use]
    pub fn with_branch_error(mut self, message: &str) -> Self {
        self.branch = Err(CollaboratorError::new(message));
        self
    }

    /// Fail origin resolution with `message`
    #[must_use]
    pub fn with_origin_error(mut self, message: &str) -> Self {
        self.origin = Err(CollaboratorError::new(message));
        self
    }
}

impl Default for StaticGit {
    fn default() -> Self {
        Self::new("main", "")
    }
}

impl GitMetadata for StaticGit {
    fn current_branch(&self) -> Result<String, CollaboratorError> {
        self.branch.clone()
    }

    fn origin_uri(&self) -> Result<String, CollaboratorError> {
        self.origin.clone()
    }
}

/// Deploy manifests held in a map, keyed by path
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    manifests: BTreeMap<String, Result<Vec<Application>, CollaboratorError>>,
}

impl StaticInventory {
    /// No manifests
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `path` declares `applications`
    #[must_use]
    pub fn with_manifest(mut self, path: &str, applications: Vec<Application>) -> Self {
        self.manifests
            .insert(normalize(path), Ok(applications));
        self
    }

    /// Reading `path` fails with `message`
    #[must_use]
    pub fn with_error(mut self, path: &str, message: &str) -> Self {
        self.manifests
            .insert(normalize(path), Err(CollaboratorError::new(message)));
        self
    }
}

impl DeployInventory for StaticInventory {
    fn applications(
        &self,
        manifest_path: &str,
        _vars_files: &[String],
        _vars: &Vars,
    ) -> Result<Vec<Application>, CollaboratorError> {
        self.manifests
            .get(&normalize(manifest_path))
            .cloned()
            .unwrap_or_else(|| {
                Err(CollaboratorError::new(format!(
                    "open {manifest_path}: no such file or directory"
                )))
            })
    }
}

/// Collaborators backed entirely by memory
#[must_use]
pub fn collaborators(files: MemoryFiles, git: StaticGit, inventory: StaticInventory) -> Collaborators {
    Collaborators::new(Arc::new(files), Arc::new(git), Arc::new(inventory))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_checks() {
        let fs = MemoryFiles::new()
            .with_executable("build.sh", "#!/bin/sh")
            .with_file("notes.txt", "hello")
            .with_file("empty.txt", "")
            .with_dir("src");

        assert_eq!(fs.check("build.sh", true), Ok(()));
        assert_eq!(fs.check("./build.sh", true), Ok(()));
        assert_eq!(fs.check("notes.txt", true), Err(FileIssue::NotExecutable));
        assert_eq!(fs.check("notes.txt", false), Ok(()));
        assert_eq!(fs.check("empty.txt", false), Err(FileIssue::Empty));
        assert_eq!(fs.check("src", false), Err(FileIssue::IsDirectory));
        assert_eq!(fs.check("missing", false), Err(FileIssue::NotFound));
    }

    #[test]
    fn test_exists_sees_parents_and_parent_relative_paths() {
        let fs = MemoryFiles::new()
            .with_file("a/b/c.txt", "x")
            .with_dir("../outside");

        assert!(fs.exists("a"));
        assert!(fs.exists("a/b"));
        assert!(fs.exists("a/x/../b/c.txt"));
        assert!(fs.exists("../outside"));
        assert!(!fs.exists("outside"));
        assert_eq!(fs.check("a", false), Err(FileIssue::IsDirectory));
    }

    #[test]
    fn test_inventory_lookup() {
        let inventory = StaticInventory::new()
            .with_manifest("manifest.yml", vec![Application::default()])
            .with_error("broken.yml", "yaml: line 3");

        let vars = Vars::new();
        assert_eq!(
            inventory.applications("./manifest.yml", &[], &vars).map(|a| a.len()),
            Ok(1)
        );
        assert_eq!(
            inventory.applications("broken.yml", &[], &vars),
            Err(CollaboratorError::new("yaml: line 3"))
        );
        assert!(inventory.applications("other.yml", &[], &vars).is_err());
    }
}
