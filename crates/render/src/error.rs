use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while rendering a manifest
#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    /// The manifest breaks an invariant the linters guarantee
    #[error("invalid manifest for rendering: {0}")]
    #[diagnostic(
        code(halfpipe::render::invalid_ir),
        help("This manifest should have been rejected by the linters; please report it")
    )]
    InvalidIr(String),

    /// The backend cannot express a feature of the manifest
    #[error("unsupported feature '{feature}' for {backend}")]
    #[diagnostic(code(halfpipe::render::unsupported))]
    UnsupportedFeature {
        /// Feature that cannot be rendered
        feature: String,
        /// Backend name
        backend: &'static str,
    },

    /// The rendered graph could not be serialized
    #[error("serialization failed: {0}")]
    #[diagnostic(code(halfpipe::render::serialization))]
    Serialization(String),
}

impl RenderError {
    /// Create an invalid-IR error
    #[must_use]
    pub fn invalid_ir(message: impl Into<String>) -> Self {
        Self::InvalidIr(message.into())
    }

    /// Create an unsupported-feature error
    #[must_use]
    pub fn unsupported(feature: impl Into<String>, backend: &'static str) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            backend,
        }
    }
}

impl From<serde_yaml::Error> for RenderError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for rendering
pub type RenderResult<T> = std::result::Result<T, RenderError>;
