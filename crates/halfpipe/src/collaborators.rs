//! Collaborators backed by the real filesystem and the `git` binary
//!
//! Every path a linter hands in is relative to the directory holding the
//! halfpipe manifest, so each implementation is rooted there.

use halfpipe_core::manifest::Vars;
use halfpipe_lint::{
    Application, CollaboratorError, Collaborators, DeployInventory, FileIssue, FileProbe,
    GitMetadata,
};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Standard collaborators for a manifest living in `root`
#[must_use]
pub fn for_directory(root: &Path) -> Collaborators {
    Collaborators::new(
        Arc::new(OsFileProbe::new(root)),
        Arc::new(GitCli::new(root)),
        Arc::new(YamlInventory::new(root)),
    )
}

/// [`FileProbe`] over the local filesystem
#[derive(Debug, Clone)]
pub struct OsFileProbe {
    root: PathBuf,
}

impl OsFileProbe {
    /// Probe resolving paths against `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileProbe for OsFileProbe {
    fn check(&self, path: &str, executable: bool) -> Result<(), FileIssue> {
        let metadata = fs::metadata(self.root.join(path)).map_err(|_| FileIssue::NotFound)?;
        if metadata.is_dir() {
            return Err(FileIssue::IsDirectory);
        }
        if metadata.len() == 0 {
            return Err(FileIssue::Empty);
        }
        if executable && !is_executable(&metadata) {
            return Err(FileIssue::NotExecutable);
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

/// [`GitMetadata`] answered by shelling out to `git`
#[derive(Debug, Clone)]
pub struct GitCli {
    dir: PathBuf,
}

impl GitCli {
    /// Run git inside `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn git(&self, args: &[&str]) -> Result<Option<String>, CollaboratorError> {
        debug!(args = ?args, dir = %self.dir.display(), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    CollaboratorError::new("looks like you don't have git installed")
                }
                _ => CollaboratorError::from(err),
            })?;

        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!stdout.is_empty()).then_some(stdout))
    }
}

impl GitMetadata for GitCli {
    fn current_branch(&self) -> Result<String, CollaboratorError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?
            .ok_or_else(|| {
                CollaboratorError::new(
                    "looks like you are not on a branch, is this a git repository with commits?",
                )
            })
    }

    fn origin_uri(&self) -> Result<String, CollaboratorError> {
        self.git(&["config", "--get", "remote.origin.url"])?
            .ok_or_else(|| {
                CollaboratorError::new("looks like you don't have a remote origin configured")
            })
    }
}

/// [`DeployInventory`] reading Cloud Foundry manifests from disk
///
/// `((name))` placeholders are filled from the vars files first, then from
/// the inline vars, which win on conflicts. Any placeholder left without a
/// value is an error, as it would be for `cf push`.
#[derive(Debug, Clone)]
pub struct YamlInventory {
    root: PathBuf,
}

impl YamlInventory {
    /// Inventory resolving paths against `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: &str) -> Result<String, CollaboratorError> {
        fs::read_to_string(self.root.join(path))
            .map_err(|err| CollaboratorError::new(format!("open {path}: {err}")))
    }

    fn variables(&self, vars_files: &[String], vars: &Vars) -> Result<Vars, CollaboratorError> {
        let mut merged = Vars::new();
        for file in vars_files {
            let parsed: BTreeMap<String, serde_yaml::Value> =
                serde_yaml::from_str(&self.read(file)?)
                    .map_err(|err| CollaboratorError::new(format!("{file}: {err}")))?;
            for (key, value) in parsed {
                merged.insert(key, scalar(&value));
            }
        }
        merged.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(merged)
    }
}

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\(\(([-\w./]+)\)\)").ok());

fn scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Replace every `((name))` in `source` with its value from `vars`
///
/// # Errors
/// Lists every placeholder without a value
pub fn interpolate(source: &str, vars: &Vars) -> Result<String, CollaboratorError> {
    let Some(placeholder) = PLACEHOLDER.as_ref() else {
        return Ok(source.to_string());
    };

    let mut missing: Vec<String> = Vec::new();
    let replaced = placeholder.replace_all(source, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        if let Some(value) = vars.get(name) {
            return value.clone();
        }
        if !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
        caps[0].to_string()
    });

    if missing.is_empty() {
        Ok(replaced.into_owned())
    } else {
        Err(CollaboratorError::new(format!(
            "Expected to find variables: {}",
            missing.join(", ")
        )))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CfManifest {
    applications: Vec<CfApplication>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct CfApplication {
    name: String,
    routes: Vec<CfRoute>,
    no_route: bool,
    health_check_type: String,
    buildpack: String,
    docker: Option<CfDocker>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CfRoute {
    route: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CfDocker {
    image: String,
}

impl From<CfApplication> for Application {
    fn from(app: CfApplication) -> Self {
        Self {
            name: app.name,
            routes: app.routes.into_iter().map(|r| r.route).collect(),
            no_route: app.no_route,
            health_check_type: app.health_check_type,
            buildpack: app.buildpack,
            docker_image: app.docker.map(|d| d.image).unwrap_or_default(),
        }
    }
}

impl DeployInventory for YamlInventory {
    fn applications(
        &self,
        manifest_path: &str,
        vars_files: &[String],
        vars: &Vars,
    ) -> Result<Vec<Application>, CollaboratorError> {
        let source = self.read(manifest_path)?;
        let interpolated = interpolate(&source, &self.variables(vars_files, vars)?)?;
        let manifest: CfManifest = serde_yaml::from_str(&interpolated)
            .map_err(|err| CollaboratorError::new(format!("{manifest_path}: {err}")))?;
        Ok(manifest.applications.into_iter().map(Application::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, contents: &str) {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, contents).unwrap();
    }

    #[test]
    fn test_file_probe_issues() {
        let dir = TempDir::new().unwrap();
        write(&dir, "build.sh", "echo hi");
        write(&dir, "empty.sh", "");
        fs::create_dir(dir.path().join("folder")).unwrap();

        let probe = OsFileProbe::new(dir.path());
        assert_eq!(probe.check("missing.sh", false), Err(FileIssue::NotFound));
        assert_eq!(probe.check("folder", false), Err(FileIssue::IsDirectory));
        assert_eq!(probe.check("empty.sh", false), Err(FileIssue::Empty));
        assert_eq!(probe.check("build.sh", false), Ok(()));
        assert!(probe.exists("folder"));
        assert!(!probe.exists("nope"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_probe_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(&dir, "build.sh", "echo hi");
        let probe = OsFileProbe::new(dir.path());
        assert_eq!(probe.check("build.sh", true), Err(FileIssue::NotExecutable));

        let path = dir.path().join("build.sh");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(probe.check("./build.sh", true), Ok(()));
    }

    #[test]
    fn test_file_probe_resolves_parent_paths() {
        let dir = TempDir::new().unwrap();
        write(&dir, "shared/script.sh", "echo hi");
        fs::create_dir(dir.path().join("app")).unwrap();

        let probe = OsFileProbe::new(dir.path().join("app"));
        assert_eq!(probe.check("../shared/script.sh", false), Ok(()));
    }

    #[test]
    fn test_interpolate() {
        let vars = Vars::from([("route".to_string(), "web.example.com".to_string())]);
        assert_eq!(
            interpolate("route: ((route))", &vars).unwrap(),
            "route: web.example.com"
        );

        let err = interpolate("a: ((x))\nb: ((y))\nc: ((x))", &vars).unwrap_err();
        assert_eq!(err.message, "Expected to find variables: x, y");
    }

    #[test]
    fn test_inventory_reads_applications() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "manifest.yml",
            "applications:\n- name: web\n  routes:\n  - route: ((host)).example.com\n  health-check-type: http\n  docker:\n    image: eu.gcr.io/halfpipe-io/web\n- name: worker\n  no-route: true\n",
        );
        write(&dir, "vars.yml", "host: from-file\nport: 8080\n");

        let inventory = YamlInventory::new(dir.path());
        let inline = Vars::from([("host".to_string(), "inline".to_string())]);
        let apps = inventory
            .applications("manifest.yml", &["vars.yml".to_string()], &inline)
            .unwrap();

        assert_eq!(apps.len(), 2);
        assert_eq!(apps[0].name, "web");
        assert_eq!(apps[0].routes, vec!["inline.example.com"]);
        assert_eq!(apps[0].health_check_type, "http");
        assert_eq!(apps[0].docker_image, "eu.gcr.io/halfpipe-io/web");
        assert!(apps[1].no_route);
        assert!(apps[1].routes.is_empty());
    }

    #[test]
    fn test_inventory_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = YamlInventory::new(dir.path())
            .applications("manifest.yml", &[], &Vars::new())
            .unwrap_err();
        assert!(err.message.starts_with("open manifest.yml:"));
    }

    #[test]
    fn test_git_outside_repository() {
        let dir = TempDir::new().unwrap();
        let git = GitCli::new(dir.path());
        assert!(git.origin_uri().is_err());
    }
}
