//! Command line arguments and CLI errors

use crate::project::ProjectError;
use crate::tracing::{LogFormat, LogLevel};
use clap::{Parser, Subcommand, ValueEnum};
use halfpipe_core::{CompilerConfig, ConfigError, Platform};
use halfpipe_render::RenderError;
use miette::Diagnostic;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// The manifest has lint errors
pub const EXIT_LINT: i32 = 1;
/// CLI, configuration or manifest loading error
pub const EXIT_CLI: i32 = 2;
/// Rendering failed on a manifest that passed linting
pub const EXIT_RENDER: i32 = 3;

/// CLI-specific error types with exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Bad arguments or compiler configuration
    #[error("configuration error: {message}")]
    #[diagnostic(code(halfpipe::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The manifest could not be found or read
    #[error("{message}")]
    #[diagnostic(code(halfpipe::cli::manifest))]
    Manifest {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The renderer failed
    #[error("rendering failed: {message}")]
    #[diagnostic(code(halfpipe::cli::render))]
    Render {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

fn help_of(diagnostic: &dyn Diagnostic) -> Option<String> {
    diagnostic.help().map(|help| help.to_string())
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            help: help_of(&err),
            message: err.to_string(),
        }
    }
}

impl From<ProjectError> for CliError {
    fn from(err: ProjectError) -> Self {
        let message = match &err {
            ProjectError::Read { source, .. } => format!("{err}: {source}"),
            _ => err.to_string(),
        };
        Self::Manifest {
            help: help_of(&err),
            message,
        }
    }
}

impl From<RenderError> for CliError {
    fn from(err: RenderError) -> Self {
        Self::Render {
            help: help_of(&err),
            message: err.to_string(),
        }
    }
}

/// Process exit code for `err`
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } | CliError::Manifest { .. } => EXIT_CLI,
        CliError::Render { .. } => EXIT_RENDER,
    }
}

/// Code naming the kind of `err` in JSON output
#[must_use]
pub const fn error_code(err: &CliError) -> &'static str {
    match err {
        CliError::Config { .. } => "config",
        CliError::Manifest { .. } => "manifest",
        CliError::Render { .. } => "render",
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Always "ok"
    pub status: &'static str,
    /// The payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Wrap `data`
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Always "error"
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Wrap `error`
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// `err` as a JSON error envelope
#[must_use]
pub fn error_json(err: &CliError) -> String {
    let envelope = ErrorEnvelope::new(serde_json::json!({
        "code": error_code(err),
        "message": err.to_string(),
    }));
    serde_json::to_string(&envelope).unwrap_or_else(|_| err.to_string())
}

/// CI engine to render for
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Concourse pipeline
    Concourse,
    /// GitHub Actions workflow
    Actions,
}

impl From<Backend> for Platform {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Concourse => Self::Concourse,
            Backend::Actions => Self::Actions,
        }
    }
}

/// Compile `.halfpipe.io` manifests into CI pipelines
#[derive(Parser, Debug)]
#[command(name = "halfpipe", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand; `render` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Manifest file, defaults to the .halfpipe.io file in the current directory
    #[arg(short, long, global = true, env = "HALFPIPE_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// TOML file with compiler settings
    #[arg(long, global = true, env = "HALFPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Render for this platform instead of the manifest's
    #[arg(long, global = true, value_enum, env = "HALFPIPE_PLATFORM")]
    pub platform: Option<Backend>,

    /// Registry prefix for halfpipe images
    #[arg(long, global = true, env = "HALFPIPE_DOCKER_REGISTRY")]
    pub docker_registry: Option<String>,

    /// Host serving the linter documentation
    #[arg(long, global = true, env = "HALFPIPE_DOC_HOST")]
    pub doc_host: Option<String>,

    /// Slack webhook used for notifications
    #[arg(long, global = true, env = "HALFPIPE_SLACK_WEBHOOK")]
    pub slack_webhook: Option<String>,

    /// Log level, `RUST_LOG` takes precedence
    #[arg(
        short = 'L',
        long,
        global = true,
        value_enum,
        default_value = "warn",
        env = "HALFPIPE_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "pretty",
        env = "HALFPIPE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Lint the manifest and report errors and warnings
    Lint {
        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lint the manifest and print the rendered pipeline
    Render,
}

impl Cli {
    /// The subcommand to run
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Render)
    }

    /// Whether output should be JSON
    #[must_use]
    pub const fn wants_json(&self) -> bool {
        matches!(self.command, Some(Commands::Lint { json: true }))
    }

    /// Compiler settings from `--config` with flag overrides applied
    ///
    /// # Errors
    /// Fails when the config file cannot be read or parsed
    pub fn compiler_config(&self) -> Result<CompilerConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => {
                let source = fs::read_to_string(path).map_err(|err| {
                    CliError::config_with_help(
                        format!("failed to read {}: {err}", path.display()),
                        "Pass an existing TOML file to --config",
                    )
                })?;
                CompilerConfig::from_toml_str(&source)?
            }
            None => CompilerConfig::default(),
        };

        if let Some(registry) = &self.docker_registry {
            config = config.with_docker_registry(registry.as_str());
        }
        if let Some(host) = &self.doc_host {
            config = config.with_doc_host(host.as_str());
        }
        if let Some(webhook) = &self.slack_webhook {
            config = config.with_slack_webhook(webhook.as_str());
        }
        Ok(config)
    }
}

/// Parse process arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse_from(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_render_is_default() {
        temp_env::with_vars_unset(["HALFPIPE_PLATFORM", "HALFPIPE_MANIFEST"], || {
            let cli = parse_from(&["halfpipe"]);
            assert_eq!(cli.command(), Commands::Render);
            assert!(cli.manifest.is_none());
            assert!(cli.platform.is_none());
            assert_eq!(cli.log_level, LogLevel::Warn);
        });
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse_from(&[
            "halfpipe",
            "lint",
            "--platform",
            "actions",
            "-m",
            "ci/.halfpipe.io",
            "-L",
            "debug",
        ]);
        assert_eq!(cli.command(), Commands::Lint { json: false });
        assert_eq!(cli.platform, Some(Backend::Actions));
        assert_eq!(cli.manifest, Some(PathBuf::from("ci/.halfpipe.io")));
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_platform_from_env() {
        temp_env::with_var("HALFPIPE_PLATFORM", Some("concourse"), || {
            let cli = parse_from(&["halfpipe"]);
            assert_eq!(cli.platform, Some(Backend::Concourse));
        });
    }

    #[test]
    fn test_compiler_config_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "doc_host = \"docs.example.com\"").unwrap();
        writeln!(file, "docker_registry = \"registry.example.com/\"").unwrap();

        let path = file.path().to_str().unwrap();
        let cli = parse_from(&[
            "halfpipe",
            "--config",
            path,
            "--docker-registry",
            "override.example.com/",
        ]);
        let config = cli.compiler_config().unwrap();
        assert_eq!(config.doc_host, "docs.example.com");
        assert_eq!(config.docker_registry, "override.example.com/");
        assert_eq!(config.artifacts_bucket, CompilerConfig::default().artifacts_bucket);
    }

    #[test]
    fn test_compiler_config_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "no_such_key = 1").unwrap();

        let cli = parse_from(&["halfpipe", "--config", file.path().to_str().unwrap()]);
        let err = cli.compiler_config().unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_CLI);
        assert!(matches!(err, CliError::Config { help: Some(_), .. }));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse_from(&["halfpipe", "--config", "/definitely/not/here.toml"]);
        let err = cli.compiler_config().unwrap_err();
        assert!(err.to_string().contains("failed to read /definitely/not/here.toml"));
    }

    #[test]
    fn test_lint_json_flag() {
        let cli = parse_from(&["halfpipe", "lint", "--json"]);
        assert_eq!(cli.command(), Commands::Lint { json: true });
        assert!(cli.wants_json());
        assert!(!parse_from(&["halfpipe", "render"]).wants_json());
    }

    #[test]
    fn test_error_json() {
        let json = error_json(&CliError::config("bad key"));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "config");
        assert_eq!(value["error"]["message"], "configuration error: bad key");
    }

    #[test]
    fn test_render_error_exit_code() {
        let err = CliError::from(RenderError::invalid_ir("no leaf"));
        assert_eq!(exit_code_for(&err), EXIT_RENDER);
        assert!(matches!(err, CliError::Render { help: Some(_), .. }));
    }
}
