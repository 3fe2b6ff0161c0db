//! Validation error taxonomy
//!
//! Errors and warnings share one type. Which list a [`LintError`] lands in
//! decides its severity, not the variant.

use miette::Diagnostic;
use thiserror::Error;

/// A single lint finding
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum LintError {
    /// A required field is absent or blank
    #[error("missing field '{field}'")]
    #[diagnostic(
        code(halfpipe::lint::missing_field),
        help("Set the field in the manifest")
    )]
    MissingField {
        /// Field name as written in the manifest
        field: String,
    },

    /// A field is present but its value is not acceptable
    #[error("invalid value for '{field}': {reason}")]
    #[diagnostic(code(halfpipe::lint::invalid_field))]
    InvalidField {
        /// Field name as written in the manifest
        field: String,
        /// What is wrong with the value
        reason: String,
    },

    /// A file referenced by the manifest is unusable
    #[error("file '{path}' {reason}")]
    #[diagnostic(
        code(halfpipe::lint::file),
        help("Paths are relative to the directory containing the manifest")
    )]
    File {
        /// Path as written in the manifest
        path: String,
        /// What is wrong with the file
        reason: String,
    },

    /// The selected backend cannot express a feature
    #[error("'{feature}' is not supported by {backend}")]
    #[diagnostic(code(halfpipe::lint::unsupported_feature))]
    UnsupportedFeature {
        /// Manifest feature
        feature: String,
        /// Backend display name
        backend: String,
    },

    /// A Cloud Foundry application manifest is unusable
    #[error("invalid CF Manifest: '{path}': {reason}")]
    #[diagnostic(code(halfpipe::lint::deploy_manifest))]
    DeployManifest {
        /// Path of the CF manifest
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// A collaborator failed; the message is kept verbatim
    #[error("{message}")]
    #[diagnostic(code(halfpipe::lint::collaborator))]
    Collaborator {
        /// Message reported by the collaborator
        message: String,
    },

    /// A finding located in the task or trigger tree, e.g. `tasks[2].tasks[0]`
    #[error("{position} {inner}")]
    #[diagnostic(code(halfpipe::lint::at))]
    At {
        /// Dotted position in the manifest
        position: String,
        /// The located finding
        inner: Box<LintError>,
    },
}

impl LintError {
    /// A missing field
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// An invalid field value
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// An unusable file
    #[must_use]
    pub fn file(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::File {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// A feature the backend cannot express
    #[must_use]
    pub fn unsupported(feature: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            backend: backend.into(),
        }
    }

    /// An unusable CF manifest
    #[must_use]
    pub fn deploy_manifest(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeployManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// A collaborator failure passed through as-is
    #[must_use]
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
        }
    }

    /// Locate the finding at `position`; nested positions are joined with `.`
    #[must_use]
    pub fn at(self, position: impl Into<String>) -> Self {
        let position = position.into();
        match self {
            Self::At {
                position: inner_position,
                inner,
            } => Self::At {
                position: format!("{position}.{inner_position}"),
                inner,
            },
            other => Self::At {
                position,
                inner: Box::new(other),
            },
        }
    }

    /// The finding without its position
    #[must_use]
    pub fn innermost(&self) -> &Self {
        match self {
            Self::At { inner, .. } => inner.innermost(),
            other => other,
        }
    }

    /// Position of a located finding
    #[must_use]
    pub fn position(&self) -> Option<&str> {
        match self {
            Self::At { position, .. } => Some(position),
            _ => None,
        }
    }

    /// Manifest field the finding is about, if it is about one
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self.innermost() {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            Self::UnsupportedFeature { feature, .. } => Some(feature),
            Self::File { path, .. } | Self::DeployManifest { path, .. } => Some(path),
            Self::Collaborator { .. } | Self::At { .. } => None,
        }
    }

    /// Whether this is a missing-field finding for `field`
    #[must_use]
    pub fn is_missing(&self, field: &str) -> bool {
        matches!(self.innermost(), Self::MissingField { field: f } if f == field)
    }

    /// Whether this is an invalid-field finding for `field`
    #[must_use]
    pub fn is_invalid(&self, field: &str) -> bool {
        matches!(self.innermost(), Self::InvalidField { field: f, .. } if f == field)
    }

    /// Whether this is a file finding for `path`
    #[must_use]
    pub fn is_file_error(&self, path: &str) -> bool {
        matches!(self.innermost(), Self::File { path: p, .. } if p == path)
    }

    /// Identifier of the documentation section explaining the finding
    #[must_use]
    pub fn doc_id(&self) -> Option<&'static str> {
        match self.innermost() {
            Self::MissingField { .. } => Some("Missing field"),
            Self::InvalidField { .. } => Some("Invalid field"),
            Self::File { .. } => Some("File error"),
            Self::UnsupportedFeature { .. } => Some("Unsupported feature"),
            Self::DeployManifest { .. } => Some("CF Manifest"),
            Self::Collaborator { .. } | Self::At { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_nest_outwards() {
        let err = LintError::missing("script").at("tasks[0]").at("tasks[2]");

        assert_eq!(err.position(), Some("tasks[2].tasks[0]"));
        assert_eq!(err.to_string(), "tasks[2].tasks[0] missing field 'script'");
        assert!(err.is_missing("script"));
        assert_eq!(err.field(), Some("script"));
    }

    #[test]
    fn test_equality_is_structural() {
        let a = LintError::invalid("uri", "bad");
        let b = LintError::invalid("branch", "bad");
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_collaborator_message_is_verbatim() {
        let err = LintError::collaborator("fatal: not a git repository");
        assert_eq!(err.to_string(), "fatal: not a git repository");
        assert_eq!(err.doc_id(), None);
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_doc_id_looks_through_position() {
        let err = LintError::file("build.sh", "does not exist").at("tasks[1]");
        assert_eq!(err.doc_id(), Some("File error"));
        assert!(err.is_file_error("build.sh"));
    }
}
