//! Linter trait and the ordered runner

use crate::collaborators::Collaborators;
use crate::linters::{
    ActionsLinter, DeployManifestLinter, FeatureTogglesLinter, ManifestLinter, SecretsLinter,
    TasksLinter, TriggersLinter,
};
use crate::result::{LintResult, LintResults};
use halfpipe_core::{CompilerConfig, Manifest};
use tracing::{debug, instrument};

/// A validator for one concern of a manifest
pub trait Linter: Send + Sync {
    /// Display name used as the heading of its findings
    fn name(&self) -> &'static str;

    /// Check `manifest`
    fn lint(&self, manifest: &Manifest) -> LintResult;
}

/// Runs a fixed, ordered list of linters
pub struct LintRunner {
    linters: Vec<Box<dyn Linter>>,
}

impl LintRunner {
    /// Runner over `linters`, in the given order
    #[must_use]
    pub fn new(linters: Vec<Box<dyn Linter>>) -> Self {
        Self { linters }
    }

    /// The standard linter set
    #[must_use]
    pub fn standard(config: &CompilerConfig, collaborators: &Collaborators) -> Self {
        Self::new(vec![
            Box::new(ManifestLinter::new(config)),
            Box::new(FeatureTogglesLinter::new(config)),
            Box::new(TriggersLinter::new(config, collaborators)),
            Box::new(TasksLinter::new(config, collaborators)),
            Box::new(SecretsLinter::new(config)),
            Box::new(DeployManifestLinter::new(config, collaborators)),
            Box::new(ActionsLinter::new()),
        ])
    }

    /// Names of the linters in run order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.linters.iter().map(|l| l.name()).collect()
    }

    /// Run every linter; warnings never stop the run
    #[instrument(name = "lint", skip_all, fields(pipeline = %manifest.pipeline))]
    pub fn run(&self, manifest: &Manifest) -> LintResults {
        self.linters
            .iter()
            .map(|linter| {
                let result = linter.lint(manifest);
                debug!(
                    linter = linter.name(),
                    errors = result.errors.len(),
                    warnings = result.warnings.len(),
                    "linter finished"
                );
                result
            })
            .collect()
    }
}

impl std::fmt::Debug for LintRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LintRunner")
            .field("linters", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryFiles, StaticGit, StaticInventory, collaborators};

    #[test]
    fn test_standard_order() {
        let runner = LintRunner::standard(
            &CompilerConfig::default(),
            &collaborators(MemoryFiles::new(), StaticGit::default(), StaticInventory::new()),
        );
        assert_eq!(
            runner.names(),
            vec![
                "Manifest",
                "Feature Toggles",
                "Triggers",
                "Tasks",
                "Secrets",
                "CF Manifest",
                "GitHub Actions",
            ]
        );
    }

    #[test]
    fn test_one_result_per_linter() {
        let runner = LintRunner::standard(
            &CompilerConfig::default(),
            &collaborators(MemoryFiles::new(), StaticGit::default(), StaticInventory::new()),
        );
        let results = runner.run(&Manifest::default());
        assert_eq!(results.len(), 7);
        assert!(results.has_errors());
    }
}
