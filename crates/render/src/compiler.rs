//! Compile controller: lint, default, render

use crate::error::RenderResult;
use crate::renderer::Renderer;
use halfpipe_core::{Defaulter, Manifest};
use halfpipe_lint::{LintResults, LintRunner};
use tracing::{info, instrument, warn};

/// Outcome of one compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    /// One result per linter, in linter order
    pub results: LintResults,
    /// Rendered document; `None` when linting found errors
    pub output: Option<String>,
}

impl Compilation {
    /// Whether a document was rendered
    #[must_use]
    pub const fn is_rendered(&self) -> bool {
        self.output.is_some()
    }
}

/// Runs the linters, then the defaulting pass and a renderer
pub struct Compiler<R> {
    renderer: R,
    linters: LintRunner,
    defaulter: Defaulter,
}

impl<R: Renderer> Compiler<R> {
    /// Compiler with the standard defaulter
    #[must_use]
    pub fn new(renderer: R, linters: LintRunner) -> Self {
        Self::with_defaulter(renderer, linters, Defaulter::default())
    }

    /// Compiler with a custom defaulter
    #[must_use]
    pub fn with_defaulter(renderer: R, linters: LintRunner, defaulter: Defaulter) -> Self {
        Self {
            renderer,
            linters,
            defaulter,
        }
    }

    /// The renderer
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Lint only
    #[must_use]
    pub fn lint(&self, manifest: &Manifest) -> LintResults {
        self.linters.run(manifest)
    }

    /// Lint the manifest and render it when no linter reported an error
    ///
    /// # Errors
    /// Returns an error if the renderer fails on a manifest that passed
    /// linting
    #[instrument(
        name = "compile",
        skip_all,
        fields(team = %manifest.team, pipeline = %manifest.pipeline, backend = self.renderer.format_name())
    )]
    pub fn compile(&self, manifest: &Manifest) -> RenderResult<Compilation> {
        let results = self.lint(manifest);
        if results.has_errors() {
            warn!(
                errors = results.errors().count(),
                "manifest has lint errors, not rendering"
            );
            return Ok(Compilation {
                results,
                output: None,
            });
        }

        let defaulted = self.defaulter.apply(manifest);
        let output = self.renderer.render_to_string(&defaulted)?;
        info!(bytes = output.len(), "rendered pipeline");

        Ok(Compilation {
            results,
            output: Some(output),
        })
    }
}

impl<R: Renderer> std::fmt::Debug for Compiler<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("renderer", &self.renderer.format_name())
            .field("linters", &self.linters)
            .field("defaulter", &self.defaulter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halfpipe_core::{CompilerConfig, LeafTask};
    use halfpipe_lint::{LintError, LintResult, Linter};
    use std::sync::{Arc, Mutex};

    struct Names {
        config: CompilerConfig,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Renderer for Names {
        type Graph = Vec<String>;

        fn render(&self, manifest: &Manifest) -> RenderResult<Self::Graph> {
            let names: Vec<String> = manifest.tasks.flatten().iter().map(|t| t.name()).collect();
            self.seen.lock().unwrap().clone_from(&names);
            Ok(names)
        }

        fn config(&self) -> &CompilerConfig {
            &self.config
        }

        fn format_name(&self) -> &'static str {
            "names"
        }
    }

    struct Fixed(Option<LintError>);

    impl Linter for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn lint(&self, _manifest: &Manifest) -> LintResult {
            let mut result = LintResult::new(self.name(), "");
            if let Some(err) = &self.0 {
                result.add_error(err.clone());
            }
            result
        }
    }

    fn compiler(error: Option<LintError>) -> (Compiler<Names>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let renderer = Names {
            config: CompilerConfig::default().with_version("0.0.1"),
            seen: Arc::clone(&seen),
        };
        let linters = LintRunner::new(vec![Box::new(Fixed(None)), Box::new(Fixed(error))]);
        (Compiler::new(renderer, linters), seen)
    }

    fn versioned() -> Manifest {
        Manifest {
            feature_toggles: halfpipe_core::FeatureToggles::new([
                halfpipe_core::FeatureToggles::UPDATE_PIPELINE,
            ]),
            ..Manifest::default()
        }
    }

    #[test]
    fn test_errors_block_rendering() {
        let (compiler, seen) = compiler(Some(LintError::missing("team")));
        let compilation = compiler.compile(&Manifest::default()).unwrap();

        assert!(!compilation.is_rendered());
        assert_eq!(compilation.results.len(), 2);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_renders_defaulted_manifest() {
        let (compiler, seen) = compiler(None);
        let compilation = compiler.compile(&versioned()).unwrap();

        let output = compilation.output.unwrap();
        assert!(output.starts_with("# Generated using halfpipe version 0.0.1"));
        assert_eq!(*seen.lock().unwrap(), vec![LeafTask::Update(Default::default()).name()]);
    }
}
