//! End-to-end tests of `execute` against real directories.

use clap::Parser;
use halfpipe::cli::{CliError, EXIT_CLI, EXIT_LINT, exit_code_for};
use halfpipe::{Cli, execute};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MANIFEST: &str = "\
team: ee
pipeline: web
triggers:
- type: git
  uri: git@github.com:ee/web.git
  private_key: ((github.private_key))
tasks:
- type: run
  script: ./build.sh
  docker:
    image: golang:1.22
";

fn cli(args: &[&str]) -> Cli {
    let mut full = vec!["halfpipe"];
    full.extend_from_slice(args);
    Cli::try_parse_from(full).unwrap()
}

fn inside_working_copy(path: &Path) -> bool {
    path.ancestors().any(|p| p.join(".git").exists())
}

fn repository() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    dir
}

#[test]
fn missing_manifest_is_a_cli_error() {
    let dir = repository();
    temp_env::with_vars_unset(["HALFPIPE_MANIFEST", "HALFPIPE_CONFIG"], || {
        let err = execute(&cli(&["lint"]), dir.path()).unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_CLI);
        assert!(err.to_string().contains("couldn't find any of the allowed"));
    });
}

#[test]
fn more_than_one_manifest_is_a_cli_error() {
    let dir = repository();
    fs::write(dir.path().join(".halfpipe.io"), MANIFEST).unwrap();
    fs::write(dir.path().join(".halfpipe.io.yaml"), MANIFEST).unwrap();

    temp_env::with_vars_unset(["HALFPIPE_MANIFEST", "HALFPIPE_CONFIG"], || {
        let err = execute(&cli(&["lint"]), dir.path()).unwrap_err();
        assert!(matches!(err, CliError::Manifest { .. }));
        assert!(err.to_string().contains("please remove all but one"));
    });
}

#[test]
fn malformed_manifest_is_a_cli_error() {
    let dir = repository();
    fs::write(dir.path().join(".halfpipe.io"), "team: [ee").unwrap();

    temp_env::with_vars_unset(["HALFPIPE_MANIFEST", "HALFPIPE_CONFIG"], || {
        let err = execute(&cli(&["render"]), dir.path()).unwrap_err();
        assert!(matches!(err, CliError::Manifest { help: Some(_), .. }));
        assert!(err.to_string().starts_with("failed to parse"));
    });
}

#[test]
fn manifest_outside_repository_is_a_cli_error() {
    let dir = TempDir::new().unwrap();
    if inside_working_copy(dir.path()) {
        return;
    }
    fs::write(dir.path().join(".halfpipe.io"), MANIFEST).unwrap();

    temp_env::with_vars_unset(["HALFPIPE_MANIFEST", "HALFPIPE_CONFIG"], || {
        let err = execute(&cli(&["lint"]), dir.path()).unwrap_err();
        assert!(err.to_string().contains("not executing halfpipe from within a git repo"));
    });
}

/// The fake `.git` directory is not a repository git can read, so the
/// branch lookup fails; the files next to the manifest are still checked.
#[test]
fn lint_checks_files_next_to_the_manifest() {
    let dir = repository();
    if dir.path().parent().is_some_and(inside_working_copy) {
        return;
    }
    let app = dir.path().join("apps").join("web");
    fs::create_dir_all(&app).unwrap();
    fs::write(app.join(".halfpipe.io"), MANIFEST).unwrap();

    temp_env::with_vars_unset(["HALFPIPE_MANIFEST", "HALFPIPE_CONFIG", "HALFPIPE_PLATFORM"], || {
        let output = execute(&cli(&["lint", "--manifest", "apps/web/.halfpipe.io"]), dir.path())
            .unwrap();
        assert_eq!(output.exit_code, EXIT_LINT);
        assert!(output.stdout.contains("file './build.sh' does not exist"));

        fs::write(app.join("build.sh"), "go build").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(app.join("build.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        }
        let output = execute(&cli(&["lint", "--manifest", "apps/web/.halfpipe.io"]), dir.path())
            .unwrap();
        assert!(!output.stdout.contains("build.sh"));
    });
}
