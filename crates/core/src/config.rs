//! Compiler configuration
//!
//! Everything that used to be a process-wide constant (registries, buckets,
//! webhook URLs, documentation host) lives on [`CompilerConfig`], which the
//! entry point builds once and threads through linting and rendering.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a compiler configuration
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The TOML document could not be parsed
    #[error("invalid compiler configuration: {0}")]
    #[diagnostic(
        code(halfpipe::config::parse),
        help("Check the keys against `CompilerConfig`; unknown keys are rejected")
    )]
    Parse(#[from] toml::de::Error),
}

/// Settings shared by every stage of a compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Registry prefix for halfpipe's own images, ending in `/`
    pub docker_registry: String,

    /// Default artifact bucket
    pub artifacts_bucket: String,

    /// Default artifact credentials
    pub artifacts_json_key: String,

    /// Bucket holding pipeline versions
    pub version_bucket: String,

    /// Credentials for the version bucket
    pub version_json_key: String,

    /// Slack webhook used by notification steps
    pub slack_webhook: String,

    /// Host serving the linter documentation
    pub doc_host: String,

    /// Domain of the halfpipe installation
    pub domain: String,

    /// Project of the halfpipe installation
    pub project: String,

    /// Cloud Foundry API that accepts docker images
    pub cf_docker_api: String,

    /// Compiler version written into rendered output
    pub version: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            docker_registry: "eu.gcr.io/halfpipe-io/".to_string(),
            artifacts_bucket: "halfpipe-io-artifacts".to_string(),
            artifacts_json_key: "((halfpipe-gcr.private_key))".to_string(),
            version_bucket: "halfpipe-io-semver".to_string(),
            version_json_key: "((halfpipe-gcr.private_key))".to_string(),
            slack_webhook: "((halfpipe-slack.webhook))".to_string(),
            doc_host: "docs.halfpipe.io".to_string(),
            domain: "halfpipe.io".to_string(),
            project: "halfpipe-io".to_string(),
            cf_docker_api: "((cloudfoundry.api-snpaas))".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl CompilerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Set the registry prefix
    #[must_use]
    pub fn with_docker_registry(mut self, registry: impl Into<String>) -> Self {
        self.docker_registry = registry.into();
        self
    }

    /// Set the documentation host
    #[must_use]
    pub fn with_doc_host(mut self, host: impl Into<String>) -> Self {
        self.doc_host = host.into();
        self
    }

    /// Set the Slack webhook
    #[must_use]
    pub fn with_slack_webhook(mut self, webhook: impl Into<String>) -> Self {
        self.slack_webhook = webhook.into();
        self
    }

    /// Set the version written into rendered output
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Image in halfpipe's registry
    #[must_use]
    pub fn registry_image(&self, name: &str) -> String {
        format!("{}{}", self.docker_registry, name)
    }

    /// Host part of the registry prefix, used for `docker login`
    #[must_use]
    pub fn registry_host(&self) -> &str {
        self.docker_registry
            .split_once('/')
            .map_or(self.docker_registry.as_str(), |(host, _)| host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CompilerConfig::from_toml_str(
            r#"
docker_registry = "registry.example.com/ci/"
doc_host = "docs.example.com"
"#,
        )
        .unwrap();

        assert_eq!(config.docker_registry, "registry.example.com/ci/");
        assert_eq!(config.doc_host, "docs.example.com");
        assert_eq!(config.artifacts_bucket, CompilerConfig::default().artifacts_bucket);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = CompilerConfig::from_toml_str("no_such_key = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_registry_image() {
        let config = CompilerConfig::default().with_docker_registry("r.io/x/");
        assert_eq!(config.registry_image("gcp-resource"), "r.io/x/gcp-resource");
    }

    #[test]
    fn test_registry_host() {
        assert_eq!(CompilerConfig::default().registry_host(), "eu.gcr.io");
        let config = CompilerConfig::default().with_docker_registry("registry.example.com/ci/");
        assert_eq!(config.registry_host(), "registry.example.com");
        assert_eq!(CompilerConfig::default().with_docker_registry("local").registry_host(), "local");
    }
}
