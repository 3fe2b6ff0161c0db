use super::docs_url;
use crate::error::LintError;
use crate::linter::Linter;
use crate::result::LintResult;
use halfpipe_core::{CompilerConfig, FeatureToggles, Manifest};

/// Rejects feature toggles the compiler does not know
#[derive(Debug, Clone)]
pub struct FeatureTogglesLinter {
    docs_url: String,
}

impl FeatureTogglesLinter {
    /// Linter documented on the configured doc host
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            docs_url: docs_url(config, "manifest/#feature_toggles"),
        }
    }
}

impl Linter for FeatureTogglesLinter {
    fn name(&self) -> &'static str {
        "Feature Toggles"
    }

    fn lint(&self, manifest: &Manifest) -> LintResult {
        let mut result = LintResult::new(self.name(), &self.docs_url);
        for toggle in manifest.feature_toggles.unknown() {
            result.add_error(LintError::invalid(
                "feature_toggles",
                format!(
                    "'{toggle}' is not a valid feature toggle, available toggles are {}",
                    FeatureToggles::AVAILABLE.join(", ")
                ),
            ));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_toggles_pass() {
        let manifest = Manifest {
            feature_toggles: FeatureToggles::new([FeatureToggles::UPDATE_PIPELINE]),
            ..Manifest::default()
        };
        let result = FeatureTogglesLinter::new(&CompilerConfig::default()).lint(&manifest);
        assert!(!result.has_errors());
    }

    #[test]
    fn test_unknown_toggle_is_an_error() {
        let manifest = Manifest {
            feature_toggles: FeatureToggles::new(["bananas", FeatureToggles::CF_V7]),
            ..Manifest::default()
        };
        let result = FeatureTogglesLinter::new(&CompilerConfig::default()).lint(&manifest);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].to_string().contains("'bananas'"));
    }
}
