//! Running `lint` and `render`
//!
//! Commands return an [`Output`] instead of printing, so `main` owns the
//! process streams and tests can inspect what would have been written.

use crate::cli::{Cli, CliError, Commands, EXIT_LINT, EXIT_OK, ErrorEnvelope, OkEnvelope};
use crate::collaborators;
use crate::project::{discover, find_manifest, load_manifest};
use halfpipe_actions::ActionsRenderer;
use halfpipe_concourse::ConcourseRenderer;
use halfpipe_core::{CompilerConfig, Manifest, Platform};
use halfpipe_lint::{Collaborators, LintError, LintResult, LintResults, LintRunner, result::doc_link};
use halfpipe_render::{Compiler, Renderer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// What a command wants written, and how the process should exit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Text for stdout
    pub stdout: String,
    /// Text for stderr
    pub stderr: String,
    /// Process exit code
    pub exit_code: i32,
}

/// Run the command selected by `cli` from `working_dir`, using the real
/// filesystem and git
///
/// # Errors
/// Fails when the configuration or manifest cannot be loaded, or rendering
/// fails
pub fn execute(cli: &Cli, working_dir: &Path) -> Result<Output, CliError> {
    let config = cli.compiler_config()?;
    let manifest_path = match &cli.manifest {
        Some(path) => working_dir.join(path),
        None => find_manifest(working_dir)?,
    };
    let manifest_dir = manifest_dir(&manifest_path, working_dir);

    let mut manifest = load_manifest(&manifest_path)?;
    if let Some(backend) = cli.platform {
        manifest.platform = backend.into();
    }

    let collaborators = collaborators::for_directory(&manifest_dir);
    discover(&manifest_dir, collaborators.git.as_ref())?.apply(&mut manifest);

    run(cli.command(), &manifest, &config, &collaborators)
}

fn manifest_dir(manifest_path: &Path, working_dir: &Path) -> PathBuf {
    manifest_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| working_dir.to_path_buf(), Path::to_path_buf)
}

/// Run `command` against an already loaded manifest
///
/// # Errors
/// Fails when a manifest that passed linting cannot be rendered
#[instrument(name = "command", skip_all, fields(command = ?command, platform = ?manifest.platform))]
pub fn run(
    command: Commands,
    manifest: &Manifest,
    config: &CompilerConfig,
    collaborators: &Collaborators,
) -> Result<Output, CliError> {
    let linters = LintRunner::standard(config, collaborators);
    match command {
        Commands::Lint { json: false } => Ok(lint(manifest, config, &linters)),
        Commands::Lint { json: true } => lint_json(manifest, config, &linters),
        Commands::Render => match manifest.platform {
            Platform::Concourse => render(
                &Compiler::new(ConcourseRenderer::new(config.clone()), linters),
                manifest,
                config,
            ),
            Platform::Actions => render(
                &Compiler::new(ActionsRenderer::new(config.clone()), linters),
                manifest,
                config,
            ),
        },
    }
}

fn lint(manifest: &Manifest, config: &CompilerConfig, linters: &LintRunner) -> Output {
    let results = linters.run(manifest);
    let report = results.render(&config.doc_host);
    info!(
        errors = results.errors().count(),
        warnings = results.warnings().count(),
        "lint finished"
    );

    Output {
        stdout: if report.is_empty() {
            "ok\n".to_string()
        } else {
            report
        },
        stderr: String::new(),
        exit_code: if results.has_errors() { EXIT_LINT } else { EXIT_OK },
    }
}

/// One finding in JSON lint output
#[derive(Debug, Clone, Serialize)]
pub struct FindingReport {
    /// Rendered message
    pub message: String,
    /// Documentation link, when the finding has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
}

/// One linter's results in JSON lint output
#[derive(Debug, Clone, Serialize)]
pub struct LinterReport {
    /// Linter name
    pub linter: String,
    /// What the linter checks
    pub docs_url: String,
    /// Findings that block rendering
    pub errors: Vec<FindingReport>,
    /// Advisory findings
    pub warnings: Vec<FindingReport>,
}

fn findings(findings: &[LintError], doc_host: &str) -> Vec<FindingReport> {
    let mut unique: Vec<&LintError> = Vec::with_capacity(findings.len());
    for finding in findings {
        if !unique.contains(&finding) {
            unique.push(finding);
        }
    }
    unique
        .into_iter()
        .map(|finding| FindingReport {
            message: finding.to_string(),
            docs: finding.doc_id().map(|id| doc_link(doc_host, id)),
        })
        .collect()
}

/// JSON view of every linter's results
#[must_use]
pub fn lint_report(results: &LintResults, doc_host: &str) -> Vec<LinterReport> {
    results
        .iter()
        .map(|result: &LintResult| LinterReport {
            linter: result.linter.clone(),
            docs_url: result.docs_url.clone(),
            errors: findings(&result.errors, doc_host),
            warnings: findings(&result.warnings, doc_host),
        })
        .collect()
}

fn lint_json(
    manifest: &Manifest,
    config: &CompilerConfig,
    linters: &LintRunner,
) -> Result<Output, CliError> {
    let results = linters.run(manifest);
    let report = lint_report(&results, &config.doc_host);

    let (json, exit_code) = if results.has_errors() {
        (serde_json::to_string(&ErrorEnvelope::new(report)), EXIT_LINT)
    } else {
        (serde_json::to_string(&OkEnvelope::new(report)), EXIT_OK)
    };
    let json = json.map_err(|err| CliError::config(format!("failed to encode lint results: {err}")))?;

    Ok(Output {
        stdout: format!("{json}\n"),
        stderr: String::new(),
        exit_code,
    })
}

fn render<R: Renderer>(
    compiler: &Compiler<R>,
    manifest: &Manifest,
    config: &CompilerConfig,
) -> Result<Output, CliError> {
    let compilation = compiler.compile(manifest)?;
    let report = compilation.results.render(&config.doc_host);

    Ok(match compilation.output {
        Some(pipeline) => Output {
            stdout: pipeline,
            stderr: report,
            exit_code: EXIT_OK,
        },
        None => Output {
            stdout: String::new(),
            stderr: report,
            exit_code: EXIT_LINT,
        },
    })
}
