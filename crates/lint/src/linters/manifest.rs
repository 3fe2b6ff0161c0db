use super::docs_url;
use crate::error::LintError;
use crate::linter::Linter;
use crate::result::LintResult;
use halfpipe_core::{CompilerConfig, Manifest};

/// Team and pipeline presence and shape
#[derive(Debug, Clone)]
pub struct ManifestLinter {
    docs_url: String,
}

impl ManifestLinter {
    /// Linter documented on the configured doc host
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            docs_url: docs_url(config, "manifest/"),
        }
    }
}

impl Linter for ManifestLinter {
    fn name(&self) -> &'static str {
        "Manifest"
    }

    fn lint(&self, manifest: &Manifest) -> LintResult {
        let mut result = LintResult::new(self.name(), &self.docs_url);

        if manifest.team.is_empty() {
            result.add_error(LintError::missing("team"));
        } else if manifest.team.to_lowercase() != manifest.team {
            result.add_warning(LintError::invalid("team", "team should be lower case"));
        }

        if manifest.pipeline.is_empty() {
            result.add_error(LintError::missing("pipeline"));
        } else if manifest.pipeline.contains(char::is_whitespace) {
            result.add_error(LintError::invalid(
                "pipeline",
                "pipeline name must not contain spaces",
            ));
        }

        result
    }
}
